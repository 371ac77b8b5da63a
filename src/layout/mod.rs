use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::geometry::{Bounds, Point};
use crate::queue::{QueueCapacities, QueueNodeId, QueueTree};

pub mod registry;
pub mod tidy;

use self::registry::{NodeKey, NodeKeyRegistry};

pub const DEFAULT_NODE_WIDTH: f64 = 300.0;
pub const DEFAULT_NODE_HEIGHT: f64 = 300.0;
pub const DEFAULT_NODE_SPACING: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    pub spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: DEFAULT_NODE_WIDTH,
            node_height: DEFAULT_NODE_HEIGHT,
            spacing: DEFAULT_NODE_SPACING,
        }
    }
}

impl LayoutConfig {
    fn horizontal_step(&self) -> f64 {
        self.node_width + self.spacing
    }

    fn vertical_step(&self) -> f64 {
        self.node_height + self.spacing
    }

    /// Box of a node anchored at its top-centre `position`.
    pub fn node_box(&self, position: Point) -> Bounds {
        Bounds {
            x: position.x - self.node_width / 2.0,
            y: position.y,
            width: self.node_width,
            height: self.node_height,
        }
    }

    /// Expand/collapse handle sits on the bottom edge of the node box.
    pub fn handle_center(&self, position: Point) -> Point {
        Point::new(position.x, position.y + self.node_height)
    }
}

/// A queue with its computed geometry. `x` is the box's horizontal centre,
/// `y` its top edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub key: NodeKey,
    pub queue: QueueNodeId,
    pub parent: Option<NodeKey>,
    pub name: String,
    pub path: String,
    pub status: Option<String>,
    pub capacities: QueueCapacities,
    pub depth: usize,
    pub collapsed: bool,
    pub has_children: bool,
    pub x: f64,
    pub y: f64,
    /// Position from the previous pass; absent for nodes new to this pass.
    pub x0: Option<f64>,
    pub y0: Option<f64>,
}

impl LayoutNode {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn prior_position(&self) -> Option<Point> {
        self.x0.zip(self.y0).map(|(x, y)| Point::new(x, y))
    }

    pub fn is_active(&self) -> bool {
        self.status
            .as_deref()
            .is_none_or(|status| status.eq_ignore_ascii_case("active"))
    }
}

/// Parent-child edge; identified by its child's key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub source: NodeKey,
    pub target: NodeKey,
    pub source_position: Point,
    pub target_position: Point,
}

impl Link {
    pub fn key(&self) -> NodeKey {
        self.target
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LayoutSnapshot {
    pub nodes: Vec<LayoutNode>,
    pub links: Vec<Link>,
    pub bounds: Option<Bounds>,
}

impl LayoutSnapshot {
    pub fn node(&self, key: NodeKey) -> Option<&LayoutNode> {
        self.nodes.iter().find(|node| node.key == key)
    }

    pub fn node_for_queue(&self, queue: QueueNodeId) -> Option<&LayoutNode> {
        self.nodes.iter().find(|node| node.queue == queue)
    }

    pub fn root(&self) -> Option<&LayoutNode> {
        self.nodes.first()
    }
}

/// Lays out the visible part of a [`QueueTree`], remembering keys and
/// positions between passes.
#[derive(Debug, Clone, Default)]
pub struct TreeLayoutEngine {
    config: LayoutConfig,
    registry: NodeKeyRegistry,
    previous: HashMap<NodeKey, Point>,
}

impl TreeLayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            registry: NodeKeyRegistry::default(),
            previous: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn key_for(&self, queue: QueueNodeId) -> Option<NodeKey> {
        self.registry.get(queue)
    }

    pub fn queue_for(&self, key: NodeKey) -> Option<QueueNodeId> {
        self.registry.queue_for(key)
    }

    /// Forgets keys and positions; used when the whole tree is replaced.
    pub fn reset(&mut self) {
        self.registry.forget_all();
        self.previous.clear();
    }

    pub fn layout(&mut self, tree: &QueueTree) -> LayoutSnapshot {
        let order = tree.visible_preorder();
        if order.is_empty() {
            self.previous.clear();
            return LayoutSnapshot::default();
        }

        let slot_of = order
            .iter()
            .enumerate()
            .map(|(slot, id)| (*id, slot))
            .collect::<HashMap<_, _>>();
        let children = order
            .iter()
            .map(|id| {
                tree.node(*id)
                    .map(|node| {
                        node.visible_children()
                            .iter()
                            .filter_map(|child| slot_of.get(child).copied())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>();
        let xs = tidy::tidy_positions(&children, self.config.horizontal_step());

        let mut nodes = Vec::with_capacity(order.len());
        for (slot, id) in order.iter().enumerate() {
            let Some(queue) = tree.node(*id) else {
                continue;
            };
            let key = self.registry.key_for(*id);
            let prior = self.previous.get(&key).copied();
            nodes.push(LayoutNode {
                key,
                queue: *id,
                parent: queue.parent.map(|parent| self.registry.key_for(parent)),
                name: queue.name.clone(),
                path: queue.path.clone(),
                status: queue.status.clone(),
                capacities: queue.capacities.clone(),
                depth: queue.depth,
                collapsed: queue.is_collapsed(),
                has_children: !queue.is_leaf(),
                x: xs[slot],
                y: queue.depth as f64 * self.config.vertical_step(),
                x0: prior.map(|point| point.x),
                y0: prior.map(|point| point.y),
            });
        }

        let positions = nodes
            .iter()
            .map(|node| (node.key, node.position()))
            .collect::<HashMap<_, _>>();
        let links = nodes
            .iter()
            .filter_map(|node| {
                let parent = node.parent?;
                Some(Link {
                    source: parent,
                    target: node.key,
                    source_position: positions.get(&parent).copied()?,
                    target_position: node.position(),
                })
            })
            .collect::<Vec<_>>();
        let bounds = nodes
            .iter()
            .map(|node| self.config.node_box(node.position()))
            .reduce(Bounds::union);

        debug!(
            nodes = nodes.len(),
            links = links.len(),
            reused = nodes.iter().filter(|node| node.x0.is_some()).count(),
            "queue tree layout pass completed"
        );
        self.previous = positions;

        LayoutSnapshot {
            nodes,
            links,
            bounds,
        }
    }
}

/// Splits a comma-separated list of dotted queue paths.
pub fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Collapses the named queues, then lays the tree out once. Unknown paths
/// are skipped.
pub fn layout_collapsed(
    mut tree: QueueTree,
    collapsed: &[String],
    config: LayoutConfig,
) -> LayoutSnapshot {
    for path in collapsed {
        match tree.find_by_path(path) {
            Some(id) => tree.collapse(id),
            None => debug!(path = %path, "ignoring unknown queue path"),
        }
    }
    TreeLayoutEngine::new(config).layout(&tree)
}
