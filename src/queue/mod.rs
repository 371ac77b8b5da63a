use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Nested queue record as served by the scheduler's partition queue endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePayload {
    #[serde(rename = "queueName", alias = "queuename", default)]
    pub queue_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub capacities: QueueCapacities,
    #[serde(default)]
    pub queues: Option<Vec<QueuePayload>>,
}

/// Capacity figures are passed through untouched for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueueCapacities {
    #[serde(default)]
    pub capacity: Value,
    #[serde(default)]
    pub usedcapacity: Value,
    #[serde(default)]
    pub maxcapacity: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct QueueNodeId(usize);

impl QueueNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildState {
    Leaf,
    Expanded(Vec<QueueNodeId>),
    Collapsed(Vec<QueueNodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueNode {
    pub name: String,
    /// Dotted path from the root, e.g. `root.sandbox.dev`.
    pub path: String,
    pub status: Option<String>,
    pub capacities: QueueCapacities,
    pub parent: Option<QueueNodeId>,
    pub depth: usize,
    children: ChildState,
}

impl QueueNode {
    pub fn child_state(&self) -> &ChildState {
        &self.children
    }

    pub fn visible_children(&self) -> &[QueueNodeId] {
        match &self.children {
            ChildState::Expanded(children) => children,
            ChildState::Leaf | ChildState::Collapsed(_) => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.children, ChildState::Leaf)
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self.children, ChildState::Collapsed(_))
    }

    pub fn is_active(&self) -> bool {
        self.status
            .as_deref()
            .is_none_or(|status| status.eq_ignore_ascii_case("active"))
    }
}

/// Arena-backed queue hierarchy. Node ids stay valid for the tree's lifetime.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueueTree {
    nodes: Vec<QueueNode>,
    root: Option<QueueNodeId>,
}

impl QueueTree {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds from the endpoint's wrapper record, whose first child is the root queue.
    pub fn from_response(response: &QueuePayload) -> Self {
        match response.queues.as_deref().and_then(<[_]>::first) {
            Some(root) => Self::from_root(root),
            None => Self::empty(),
        }
    }

    pub fn from_root(root: &QueuePayload) -> Self {
        let mut tree = Self::default();
        let root_id = tree.insert(root, None, "");
        tree.root = Some(root_id);
        tree
    }

    fn insert(
        &mut self,
        payload: &QueuePayload,
        parent: Option<QueueNodeId>,
        prefix: &str,
    ) -> QueueNodeId {
        let id = QueueNodeId(self.nodes.len());
        let path = if prefix.is_empty() {
            payload.queue_name.clone()
        } else {
            format!("{prefix}.{}", payload.queue_name)
        };
        let depth = parent.map_or(0, |parent| self.nodes[parent.0].depth + 1);
        self.nodes.push(QueueNode {
            name: payload.queue_name.clone(),
            path: path.clone(),
            status: payload.status.clone(),
            capacities: payload.capacities.clone(),
            parent,
            depth,
            children: ChildState::Leaf,
        });

        let children = payload
            .queues
            .iter()
            .flatten()
            .map(|child| self.insert(child, Some(id), &path))
            .collect::<Vec<_>>();
        if !children.is_empty() {
            self.nodes[id.0].children = ChildState::Expanded(children);
        }
        id
    }

    pub fn root(&self) -> Option<QueueNodeId> {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: QueueNodeId) -> Option<&QueueNode> {
        self.nodes.get(id.0)
    }

    pub fn find_by_path(&self, path: &str) -> Option<QueueNodeId> {
        self.nodes
            .iter()
            .position(|node| node.path == path)
            .map(QueueNodeId)
    }

    pub fn expand(&mut self, id: QueueNodeId) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        node.children = match std::mem::replace(&mut node.children, ChildState::Leaf) {
            ChildState::Collapsed(children) => ChildState::Expanded(children),
            other => other,
        };
    }

    pub fn collapse(&mut self, id: QueueNodeId) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        node.children = match std::mem::replace(&mut node.children, ChildState::Leaf) {
            ChildState::Expanded(children) => ChildState::Collapsed(children),
            other => other,
        };
    }

    pub fn toggle(&mut self, id: QueueNodeId) {
        let collapsed = match self.node(id).map(QueueNode::child_state) {
            Some(ChildState::Collapsed(_)) => true,
            Some(ChildState::Expanded(_)) => false,
            Some(ChildState::Leaf) | None => return,
        };
        if collapsed {
            self.expand(id);
        } else {
            self.collapse(id);
        }
    }

    /// Visible nodes in pre-order, skipping the contents of collapsed subtrees.
    pub fn visible_preorder(&self) -> Vec<QueueNodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = self.root.into_iter().collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].visible_children().iter().rev().copied());
        }
        order
    }
}

/// Renders a pass-through capacity value without JSON string quoting.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "n/a".to_owned(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
