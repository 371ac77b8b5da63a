use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{info, warn};

use crate::api::{PartitionInfo, SchedulerClient};
use crate::config::DashboardSettings;
use crate::diagram::QueueDiagram;
use crate::geometry::Point;
use crate::layout::LayoutConfig;
use crate::layout::registry::NodeKey;
use crate::queue::{QueueTree, display_value};
use crate::refresh::{RefreshConfig, RefreshHandle, RefreshUpdate, spawn_refresh_worker};
use crate::storage::{SelectionMemo, load_selection, save_selection};
use crate::utilization::{NodeUtilizationsInfo, UtilizationChart, chart_for_partition};
use crate::viewport::ViewportSize;

pub mod canvas;
pub mod events;

use self::canvas::{paint_diagram, parse_hex_color};
use self::events::{CanvasAction, action_for_click, apply_action, pan_action, zoom_action};

const APP_TITLE: &str = "schedviz";
const IDLE_REPAINT_INTERVAL: Duration = Duration::from_millis(250);
const INITIAL_VIEWPORT: ViewportSize = ViewportSize {
    width: 1024.0,
    height: 768.0,
};

pub fn run_viewer(settings: &DashboardSettings) -> Result<()> {
    let runtime_handle = Handle::try_current().context("viewer requires a tokio runtime")?;

    let memo = settings.state_file.as_deref().and_then(|path| {
        load_selection(path).unwrap_or_else(|error| {
            warn!(error = %error, "ignoring unreadable selection memo");
            None
        })
    });
    let partition = memo
        .as_ref()
        .map(|memo| memo.partition.clone())
        .unwrap_or_else(|| settings.partition.clone());
    let pending_queue = memo.and_then(|memo| memo.queue);

    let (refresh_handle, update_rx) = spawn_refresh_worker(
        &runtime_handle,
        SchedulerClient::new(settings),
        RefreshConfig {
            partition: partition.clone(),
            interval: settings.refresh_interval(),
        },
    );
    info!(
        scheduler = %settings.scheduler_base_url,
        partition = %partition,
        "starting native viewer"
    );

    let app = ViewerApp {
        state_file: settings.state_file.clone(),
        refresh: refresh_handle,
        update_rx,
        diagram: QueueDiagram::new(
            LayoutConfig::default(),
            INITIAL_VIEWPORT,
            settings.transition(),
        ),
        partitions: Vec::new(),
        partition,
        pending_queue,
        infos: Vec::new(),
        chart: None,
        status: "Waiting for first refresh...".to_owned(),
        started: Instant::now(),
        worker_disconnected: false,
    };

    eframe::run_native(
        APP_TITLE,
        eframe::NativeOptions::default(),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|error| anyhow::anyhow!("viewer UI exited with error: {error}"))
}

struct ViewerApp {
    state_file: Option<PathBuf>,
    refresh: RefreshHandle,
    update_rx: UnboundedReceiver<RefreshUpdate>,
    diagram: QueueDiagram,
    partitions: Vec<PartitionInfo>,
    partition: String,
    /// Queue path to reselect once the next tree arrives.
    pending_queue: Option<String>,
    infos: Vec<NodeUtilizationsInfo>,
    chart: Option<UtilizationChart>,
    status: String,
    started: Instant,
    worker_disconnected: bool,
}

impl ViewerApp {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn drain_updates(&mut self) {
        loop {
            match self.update_rx.try_recv() {
                Ok(update) => self.apply_update(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.worker_disconnected {
                        warn!("refresh worker disconnected");
                        self.status = "Refresh worker stopped; data is no longer updated.".to_owned();
                    }
                    self.worker_disconnected = true;
                    break;
                }
            }
        }
    }

    fn apply_update(&mut self, update: RefreshUpdate) {
        match update {
            RefreshUpdate::Partitions(partitions) => self.partitions = partitions,
            RefreshUpdate::QueueTree {
                partition, tree, ..
            } => {
                if partition != self.partition {
                    return;
                }
                let now = self.now();
                self.diagram.replace_tree(tree, now);
                self.restore_pending_selection();
                self.status = format!(
                    "Partition {partition}: {} queues",
                    self.diagram.tree().len()
                );
            }
            RefreshUpdate::Utilization { infos, .. } => {
                self.chart = Some(chart_for_partition(&infos, &self.partition));
                self.infos = infos;
            }
            RefreshUpdate::Failed { stream, error } => {
                self.status = format!("{} refresh failed: {error}", stream.label());
            }
        }
    }

    fn restore_pending_selection(&mut self) {
        let Some(path) = self.pending_queue.take() else {
            return;
        };
        let key = self
            .diagram
            .snapshot()
            .nodes
            .iter()
            .find(|node| node.path == path)
            .map(|node| node.key);
        if let Some(key) = key
            && self.diagram.selection().selected() != Some(key)
        {
            self.diagram.select(key);
        }
    }

    fn select_partition(&mut self, partition: String) {
        if partition == self.partition {
            return;
        }
        self.partition = partition.clone();
        self.pending_queue = None;
        let now = self.now();
        self.diagram.replace_tree(QueueTree::empty(), now);
        self.chart = Some(chart_for_partition(&self.infos, &self.partition));
        self.refresh.select_partition(partition);
        self.remember(None);
    }

    fn remember_selection(&self, key: NodeKey) {
        let path = self.diagram.snapshot().node(key).map(|node| node.path.clone());
        self.remember(path);
    }

    fn remember(&self, queue: Option<String>) {
        let Some(path) = &self.state_file else {
            return;
        };
        let memo = SelectionMemo::new(self.partition.clone(), queue);
        if let Err(error) = save_selection(path, &memo) {
            warn!(error = %error, "failed to persist selection memo");
        }
    }

    fn run_action(&mut self, action: CanvasAction) {
        let now = self.now();
        if let Some(key) = apply_action(&mut self.diagram, action, now) {
            self.remember_selection(key);
        }
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let mut chosen = None;
            egui::ComboBox::from_label("Partition")
                .selected_text(&self.partition)
                .show_ui(ui, |ui| {
                    for partition in &self.partitions {
                        if ui
                            .selectable_label(partition.name == self.partition, &partition.name)
                            .clicked()
                        {
                            chosen = Some(partition.name.clone());
                        }
                    }
                });
            if let Some(partition) = chosen {
                self.select_partition(partition);
            }

            if ui.button("Refresh").clicked() {
                self.refresh.refresh_now();
            }
            if ui.button("Fit").clicked() {
                self.run_action(CanvasAction::Fit);
            }
            ui.separator();
            ui.label(&self.status);
        });
    }

    fn render_chart_pane(&self, ui: &mut egui::Ui) {
        ui.heading("Node utilization");
        let Some(chart) = &self.chart else {
            ui.label("No utilization data yet.");
            return;
        };
        if chart.datasets.is_empty() {
            ui.label(format!("No utilization data for {}.", self.partition));
            return;
        }

        egui::ScrollArea::vertical().show(ui, |ui| {
            for dataset in &chart.datasets {
                ui.group(|ui| {
                    ui.horizontal(|ui| {
                        let color = parse_hex_color(&dataset.color).unwrap_or(egui::Color32::GRAY);
                        ui.colored_label(color, "■");
                        ui.label(egui::RichText::new(&dataset.label).strong());
                        ui.label(format!(
                            "avg {:.0}%",
                            dataset.average_utilization * 100.0
                        ));
                    });
                    egui::Grid::new(("buckets", &dataset.label))
                        .num_columns(2)
                        .show(ui, |ui| {
                            for (index, label) in chart.labels.iter().enumerate() {
                                ui.label(label);
                                let count = ui.label(dataset.data[index].to_string());
                                if !dataset.description[index].is_empty() {
                                    count.on_hover_text(&dataset.description[index]);
                                }
                                ui.end_row();
                            }
                        });
                });
                ui.add_space(6.0);
            }
        });
    }

    fn render_detail_pane(&self, ui: &mut egui::Ui) {
        let Some(node) = self.diagram.selected_node() else {
            return;
        };
        ui.heading(&node.name);
        ui.label(format!("Path: {}", node.path));
        ui.label(format!(
            "Status: {}",
            node.status.as_deref().unwrap_or("unknown")
        ));
        ui.label(format!(
            "Capacity: {}",
            display_value(&node.capacities.capacity)
        ));
        ui.label(format!(
            "Used: {}",
            display_value(&node.capacities.usedcapacity)
        ));
        ui.label(format!(
            "Max: {}",
            display_value(&node.capacities.maxcapacity)
        ));
    }

    fn render_canvas(&mut self, ui: &mut egui::Ui) -> bool {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;
        self.diagram.resize(ViewportSize {
            width: f64::from(rect.width()),
            height: f64::from(rect.height()),
        });
        let local = |pos: egui::Pos2| {
            Point::new(f64::from(pos.x - rect.min.x), f64::from(pos.y - rect.min.y))
        };

        let now = self.now();
        let mut actions = Vec::new();
        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            actions.extend(action_for_click(self.diagram.hit_test(local(pos), now)));
        }
        if response.dragged() {
            let delta = response.drag_delta();
            actions.extend(pan_action(f64::from(delta.x), f64::from(delta.y)));
        }
        if let Some(pos) = response.hover_pos() {
            let (pinch, scroll) =
                ui.input(|input| (input.zoom_delta(), input.smooth_scroll_delta.y));
            actions.extend(zoom_action(f64::from(pinch), f64::from(scroll), local(pos)));
        }
        for action in actions {
            self.run_action(action);
        }

        let frame = self.diagram.frame(self.now());
        paint_diagram(
            &painter,
            rect.min,
            &frame,
            self.diagram.snapshot(),
            self.diagram.config(),
        );
        frame.animating
    }
}

impl Drop for ViewerApp {
    fn drop(&mut self) {
        self.refresh.shutdown();
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_updates();

        egui::TopBottomPanel::top("viewer_toolbar").show(ctx, |ui| self.render_toolbar(ui));

        egui::SidePanel::right("viewer_chart_pane")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.render_chart_pane(ui));

        if self.diagram.selection().detail_visible() {
            egui::TopBottomPanel::bottom("viewer_detail_pane")
                .resizable(true)
                .show(ctx, |ui| self.render_detail_pane(ui));
        }

        let animating = egui::CentralPanel::default()
            .show(ctx, |ui| self.render_canvas(ui))
            .inner;

        if animating {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(IDLE_REPAINT_INTERVAL);
        }
    }
}
