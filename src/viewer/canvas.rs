use eframe::egui::{self, Align2, Color32, FontId, Painter, Pos2, Rect, Stroke};

use crate::diagram::{DiagramFrame, HANDLE_RADIUS};
use crate::geometry::Point;
use crate::layout::{LayoutConfig, LayoutNode, LayoutSnapshot};
use crate::queue::display_value;
use crate::viewport::Transform;

const ACTIVE_FILL: Color32 = Color32::from_rgb(233, 243, 252);
const INACTIVE_FILL: Color32 = Color32::from_rgb(236, 236, 236);
const SELECTED_FILL: Color32 = Color32::from_rgb(255, 236, 196);
const NODE_STROKE: Color32 = Color32::from_rgb(68, 111, 166);
const SELECTED_STROKE: Color32 = Color32::from_rgb(204, 118, 47);
const LINK_STROKE: Color32 = Color32::from_rgb(142, 160, 184);
const TEXT_COLOR: Color32 = Color32::from_rgb(39, 66, 98);
/// Labels are skipped once a node box is shorter than this on screen.
const MIN_LABEL_BOX_HEIGHT: f32 = 36.0;

/// `#rrggbb` to an egui color.
pub fn parse_hex_color(hex: &str) -> Option<Color32> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(digits.get(range)?, 16).ok();
    Some(Color32::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

pub fn node_label_lines(node: &LayoutNode) -> Vec<String> {
    vec![
        node.name.clone(),
        format!("capacity: {}", display_value(&node.capacities.capacity)),
        format!("used: {}", display_value(&node.capacities.usedcapacity)),
        format!("max: {}", display_value(&node.capacities.maxcapacity)),
    ]
}

fn to_screen(origin: Pos2, transform: &Transform, point: Point) -> Pos2 {
    let local = transform.apply(point);
    Pos2::new(origin.x + local.x as f32, origin.y + local.y as f32)
}

/// Paints links first, then nodes on top, in frame order.
pub fn paint_diagram(
    painter: &Painter,
    origin: Pos2,
    frame: &DiagramFrame,
    snapshot: &LayoutSnapshot,
    config: &LayoutConfig,
) {
    let transform = &frame.transform;
    let link_stroke = Stroke::new(1.5, LINK_STROKE);

    for link in &frame.scene.links {
        let from = to_screen(origin, transform, config.handle_center(link.source_position));
        let to = to_screen(origin, transform, link.target_position);
        painter.line_segment([from, to], link_stroke);
    }

    let scale = transform.scale as f32;
    for drawn in &frame.scene.nodes {
        let bounds = config.node_box(drawn.position);
        let rect = Rect::from_min_max(
            to_screen(origin, transform, Point::new(bounds.x, bounds.y)),
            to_screen(
                origin,
                transform,
                Point::new(bounds.x + bounds.width, bounds.y + bounds.height),
            ),
        );
        let opacity = drawn.opacity.clamp(0.0, 1.0) as f32;
        let node = snapshot.node(drawn.key);
        let selected = frame.selected == Some(drawn.key);

        let fill = match node {
            _ if selected => SELECTED_FILL,
            Some(node) if !node.is_active() => INACTIVE_FILL,
            _ => ACTIVE_FILL,
        };
        let stroke = if selected {
            Stroke::new(2.5, SELECTED_STROKE.gamma_multiply(opacity))
        } else {
            Stroke::new(1.0, NODE_STROKE.gamma_multiply(opacity))
        };
        painter.rect_filled(rect, 6.0 * scale, fill.gamma_multiply(opacity));
        painter.rect_stroke(rect, 6.0 * scale, stroke, egui::StrokeKind::Inside);

        let Some(node) = node else {
            continue;
        };
        if rect.height() >= MIN_LABEL_BOX_HEIGHT {
            let font = FontId::proportional((rect.height() / 10.0).clamp(8.0, 18.0));
            let line_height = rect.height() / 5.0;
            for (index, line) in node_label_lines(node).iter().enumerate() {
                let y = rect.top() + line_height * (index as f32 + 0.8);
                painter.text(
                    Pos2::new(rect.center().x, y),
                    Align2::CENTER_CENTER,
                    line,
                    font.clone(),
                    TEXT_COLOR.gamma_multiply(opacity),
                );
            }
        }

        if node.has_children {
            let center = to_screen(origin, transform, config.handle_center(drawn.position));
            let radius = (HANDLE_RADIUS as f32 * scale).max(4.0);
            painter.circle_filled(center, radius, NODE_STROKE.gamma_multiply(opacity));
            painter.text(
                center,
                Align2::CENTER_CENTER,
                if node.collapsed { "+" } else { "-" },
                FontId::monospace(radius * 1.4),
                Color32::WHITE,
            );
        }
    }
}
