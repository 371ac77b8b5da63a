use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::geometry::Point;
use crate::layout::registry::NodeKey;
use crate::layout::{LayoutConfig, LayoutNode, LayoutSnapshot, Link, TreeLayoutEngine};
use crate::queue::QueueTree;
use crate::reconcile::scene::{Scene, SceneFrame};
use crate::reconcile::selection::{Selection, SelectionChange};
use crate::reconcile::{FocusPoint, reconcile};
use crate::viewport::{Transform, ViewportController, ViewportSize};

/// Radius, in diagram units, of the expand/collapse handle hit area.
pub const HANDLE_RADIUS: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "camelCase")]
pub enum HitTarget {
    Body(NodeKey),
    ToggleHandle(NodeKey),
}

/// Everything a renderer needs for one paint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramFrame {
    pub scene: SceneFrame,
    pub transform: Transform,
    pub selected: Option<NodeKey>,
    pub detail_visible: bool,
    pub animating: bool,
}

/// One interactive queue diagram: tree state, layout, animated scene,
/// selection and viewport, driven by an externally supplied clock.
#[derive(Debug, Clone)]
pub struct QueueDiagram {
    tree: QueueTree,
    engine: TreeLayoutEngine,
    snapshot: LayoutSnapshot,
    scene: Scene,
    selection: Selection,
    viewport: ViewportController,
    transition: Duration,
}

impl QueueDiagram {
    pub fn new(config: LayoutConfig, viewport: ViewportSize, transition: Duration) -> Self {
        Self {
            tree: QueueTree::empty(),
            engine: TreeLayoutEngine::new(config),
            snapshot: LayoutSnapshot::default(),
            scene: Scene::new(transition),
            selection: Selection::default(),
            viewport: ViewportController::new(viewport),
            transition,
        }
    }

    pub fn tree(&self) -> &QueueTree {
        &self.tree
    }

    pub fn snapshot(&self) -> &LayoutSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &LayoutConfig {
        self.engine.config()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected_node(&self) -> Option<&LayoutNode> {
        self.selection
            .selected()
            .and_then(|key| self.snapshot.node(key))
    }

    /// Swaps in a freshly fetched tree. Keys and collapse state are dropped.
    /// Queues whose path survives move from their last laid-out spot, new ones
    /// grow out of the root, and the selection follows its queue path.
    pub fn replace_tree(&mut self, tree: QueueTree, now: Duration) {
        let reselect = self
            .selected_node()
            .map(|node| (node.path.clone(), self.selection.detail_visible()));
        let previous = std::mem::take(&mut self.snapshot);

        self.tree = tree;
        self.engine.reset();
        self.scene.clear();
        self.selection.clear();

        let next = self.engine.layout(&self.tree);
        let origin = next.root().map(LayoutNode::position).unwrap_or_default();
        let carried = carry_positions_by_path(&previous, &next);
        let plan = reconcile(&carried, &next, FocusPoint::fixed(origin));
        self.scene.apply(&plan, now);
        self.snapshot = next;

        if let Some((path, detail_visible)) = reselect
            && let Some(node) = self.snapshot.nodes.iter().find(|node| node.path == path)
        {
            self.selection.restore(node.key, detail_visible);
        }
        debug!(
            nodes = self.snapshot.nodes.len(),
            carried = carried.nodes.len(),
            selected = self.selection.selected().is_some(),
            "queue tree replaced"
        );
        self.fit(now);
    }

    /// Expands or collapses the node behind `key`. Returns `false` for
    /// unknown keys and true leaves.
    pub fn toggle(&mut self, key: NodeKey, now: Duration) -> bool {
        let Some(queue) = self.engine.queue_for(key) else {
            return false;
        };
        if self.tree.node(queue).is_none_or(|node| node.is_leaf()) {
            return false;
        }

        self.tree.toggle(queue);
        let next = self.engine.layout(&self.tree);
        let Some(toggled) = next.node(key) else {
            return false;
        };
        let focus = FocusPoint {
            prior: toggled.prior_position().unwrap_or(toggled.position()),
            current: toggled.position(),
        };
        let plan = reconcile(&self.snapshot, &next, focus);
        self.scene.apply(&plan, now);
        debug!(
            node = %key,
            collapsed = toggled.collapsed,
            nodes = next.nodes.len(),
            "queue node toggled"
        );
        self.snapshot = next;

        let snapshot = &self.snapshot;
        self.selection.retain(|key| snapshot.node(key).is_some());
        self.fit(now);
        true
    }

    pub fn select(&mut self, key: NodeKey) -> Option<SelectionChange> {
        self.snapshot.node(key)?;
        Some(self.selection.select(key))
    }

    pub fn fit(&mut self, now: Duration) {
        if let Some(bounds) = self.snapshot.bounds {
            self.viewport.begin_fit(bounds, now, self.transition);
        }
    }

    pub fn zoom(&mut self, factor: f64, anchor: Point, now: Duration) {
        self.viewport.zoom(factor, anchor, now);
    }

    pub fn pan(&mut self, dx: f64, dy: f64, now: Duration) {
        self.viewport.pan(dx, dy, now);
    }

    pub fn resize(&mut self, size: ViewportSize) {
        self.viewport.resize(size);
    }

    pub fn frame(&mut self, now: Duration) -> DiagramFrame {
        let scene = self.scene.tick(now);
        let transform = self.viewport.transform_at(now);
        let animating = scene.animating || self.viewport.is_animating();
        DiagramFrame {
            scene,
            transform,
            selected: self.selection.selected(),
            detail_visible: self.selection.detail_visible(),
            animating,
        }
    }

    /// Maps a screen point to the node under it, checking handles first.
    /// Hit areas follow laid-out positions, not in-flight ones.
    pub fn hit_test(&mut self, screen: Point, now: Duration) -> Option<HitTarget> {
        let point = self.viewport.transform_at(now).invert(screen);
        let config = *self.engine.config();

        self.snapshot.nodes.iter().rev().find_map(|node| {
            let handle = config.handle_center(node.position());
            let distance = (point.x - handle.x).hypot(point.y - handle.y);
            if node.has_children && distance <= HANDLE_RADIUS {
                return Some(HitTarget::ToggleHandle(node.key));
            }
            config
                .node_box(node.position())
                .contains(point)
                .then_some(HitTarget::Body(node.key))
        })
    }
}

/// Re-keys the previous pass onto `next` by queue path, so a refetch only
/// animates queues that actually moved, appeared or vanished.
fn carry_positions_by_path(previous: &LayoutSnapshot, next: &LayoutSnapshot) -> LayoutSnapshot {
    let old_positions = previous
        .nodes
        .iter()
        .map(|node| (node.path.as_str(), node.position()))
        .collect::<HashMap<_, _>>();
    let carried_positions = next
        .nodes
        .iter()
        .filter_map(|node| {
            old_positions
                .get(node.path.as_str())
                .map(|position| (node.key, *position))
        })
        .collect::<HashMap<_, _>>();

    let nodes = next
        .nodes
        .iter()
        .filter_map(|node| {
            let position = carried_positions.get(&node.key)?;
            Some(LayoutNode {
                x: position.x,
                y: position.y,
                ..node.clone()
            })
        })
        .collect();
    let links = next
        .links
        .iter()
        .filter_map(|link| {
            Some(Link {
                source_position: *carried_positions.get(&link.source)?,
                target_position: *carried_positions.get(&link.target)?,
                ..*link
            })
        })
        .collect();

    LayoutSnapshot {
        nodes,
        links,
        bounds: None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::geometry::Point;
    use crate::layout::LayoutConfig;
    use crate::queue::QueueTree;
    use crate::test_support::{sample_queue_response, sample_queue_response_json};
    use crate::viewport::{ViewportSize, fit_to_screen};

    use super::{HitTarget, QueueDiagram};

    const TRANSITION: Duration = Duration::from_millis(750);
    const VIEWPORT: ViewportSize = ViewportSize {
        width: 1200.0,
        height: 800.0,
    };

    fn loaded_diagram() -> QueueDiagram {
        let mut diagram = QueueDiagram::new(LayoutConfig::default(), VIEWPORT, TRANSITION);
        diagram.replace_tree(
            QueueTree::from_response(&sample_queue_response()),
            Duration::ZERO,
        );
        diagram
    }

    #[test]
    fn replace_tree_grows_from_root_and_fits() {
        let mut diagram = loaded_diagram();
        let root = diagram.snapshot().root().expect("root").position();

        let first = diagram.frame(Duration::ZERO);
        assert!(first.animating);
        assert_eq!(first.scene.nodes.len(), 6);
        assert!(first.scene.nodes.iter().all(|node| node.position == root));

        let settled = diagram.frame(TRANSITION);
        assert!(!settled.animating);
        let bounds = diagram.snapshot().bounds.expect("bounds");
        assert_eq!(settled.transform, fit_to_screen(bounds, VIEWPORT));
    }

    #[test]
    fn toggle_collapses_and_removes_exiting_nodes() {
        let mut diagram = loaded_diagram();
        diagram.frame(TRANSITION);
        let sandbox = diagram
            .snapshot()
            .nodes
            .iter()
            .find(|node| node.path == "root.sandbox")
            .map(|node| node.key)
            .expect("sandbox");

        assert!(diagram.toggle(sandbox, TRANSITION));
        assert_eq!(diagram.snapshot().nodes.len(), 3);
        assert_eq!(diagram.frame(TRANSITION + TRANSITION / 2).scene.nodes.len(), 6);
        assert_eq!(diagram.frame(TRANSITION * 2).scene.nodes.len(), 3);

        assert!(diagram.toggle(sandbox, TRANSITION * 2));
        assert_eq!(diagram.snapshot().nodes.len(), 6);
    }

    #[test]
    fn toggling_a_leaf_does_nothing() {
        let mut diagram = loaded_diagram();
        let production = diagram
            .snapshot()
            .nodes
            .iter()
            .find(|node| node.path == "root.production")
            .map(|node| node.key)
            .expect("production");

        assert!(!diagram.toggle(production, TRANSITION));
        assert_eq!(diagram.snapshot().nodes.len(), 6);
    }

    #[test]
    fn replace_tree_drops_collapse_state_but_follows_selected_path() {
        let mut diagram = loaded_diagram();
        let root = diagram.snapshot().root().expect("root").key;
        diagram.select(root).expect("root is selectable");
        assert!(diagram.toggle(root, TRANSITION));
        assert_eq!(diagram.snapshot().nodes.len(), 1);

        diagram.replace_tree(
            QueueTree::from_response(&sample_queue_response()),
            TRANSITION * 2,
        );
        assert_eq!(diagram.snapshot().nodes.len(), 6);
        assert!(diagram.snapshot().node(root).is_none());
        let selected = diagram.selected_node().expect("selection follows the path");
        assert_eq!(selected.path, "root");
        assert!(diagram.selection().detail_visible());
    }

    #[test]
    fn identical_refetch_keeps_selection_and_positions() {
        let mut diagram = loaded_diagram();
        diagram.frame(TRANSITION);
        let production = diagram
            .snapshot()
            .nodes
            .iter()
            .find(|node| node.path == "root.production")
            .map(|node| node.key)
            .expect("production");
        diagram.select(production).expect("production is selectable");

        diagram.replace_tree(
            QueueTree::from_response(&sample_queue_response()),
            TRANSITION * 2,
        );

        let selected = diagram.selected_node().expect("selection survives");
        assert_eq!(selected.path, "root.production");
        let selected = selected.key;
        assert!(diagram.selection().detail_visible());

        let frame = diagram.frame(TRANSITION * 2);
        for node in &diagram.snapshot().nodes {
            let drawn = frame.scene.node(node.key).expect("node should be drawn");
            assert_eq!(drawn.position, node.position(), "{} should not move", node.path);
            assert_eq!(drawn.opacity, 1.0);
        }
        assert_eq!(frame.selected, Some(selected));
    }

    #[test]
    fn refetch_without_selected_queue_clears_selection() {
        let mut diagram = loaded_diagram();
        let production = diagram
            .snapshot()
            .nodes
            .iter()
            .find(|node| node.path == "root.production")
            .map(|node| node.key)
            .expect("production");
        diagram.select(production).expect("production is selectable");

        let mut payload = sample_queue_response_json();
        payload["queues"][0]["queues"]
            .as_array_mut()
            .expect("root children")
            .truncate(1);
        let payload = serde_json::from_value(payload).expect("payload should decode");
        diagram.replace_tree(QueueTree::from_response(&payload), TRANSITION);

        assert_eq!(diagram.snapshot().nodes.len(), 5);
        assert_eq!(diagram.selection().selected(), None);
        assert!(!diagram.selection().detail_visible());
    }

    #[test]
    fn collapsing_an_ancestor_clears_hidden_selection() {
        let mut diagram = loaded_diagram();
        let nightly = diagram
            .snapshot()
            .nodes
            .iter()
            .find(|node| node.path == "root.sandbox.test.nightly")
            .map(|node| node.key)
            .expect("nightly");
        let root = diagram.snapshot().root().expect("root").key;

        diagram.select(nightly).expect("nightly is selectable");
        diagram.toggle(root, TRANSITION);
        assert_eq!(diagram.selection().selected(), None);
        assert!(diagram.select(nightly).is_none());
    }

    #[test]
    fn hit_test_distinguishes_handle_from_body() {
        let mut diagram = loaded_diagram();
        let transform = diagram.frame(TRANSITION).transform;
        let config = *diagram.config();
        let root = diagram.snapshot().root().expect("root").clone();

        let body = transform.apply(Point::new(root.x, root.y + config.node_height / 4.0));
        assert_eq!(
            diagram.hit_test(body, TRANSITION),
            Some(HitTarget::Body(root.key))
        );

        let handle = transform.apply(config.handle_center(root.position()));
        assert_eq!(
            diagram.hit_test(handle, TRANSITION),
            Some(HitTarget::ToggleHandle(root.key))
        );

        let empty = transform.apply(Point::new(root.x, root.y - config.spacing / 2.0));
        assert_eq!(diagram.hit_test(empty, TRANSITION), None);
    }

    #[test]
    fn zoom_composes_with_fit() {
        let mut diagram = loaded_diagram();
        let fitted = diagram.frame(TRANSITION).transform;

        diagram.zoom(2.0, VIEWPORT.center(), TRANSITION);
        let zoomed = diagram.frame(TRANSITION).transform;
        assert!((zoomed.scale - fitted.scale * 2.0).abs() < 1e-9);

        diagram.pan(10.0, -5.0, TRANSITION);
        let panned = diagram.frame(TRANSITION).transform;
        assert_eq!(panned.translate.x, zoomed.translate.x + 10.0);
        assert_eq!(panned.translate.y, zoomed.translate.y - 5.0);
    }
}
