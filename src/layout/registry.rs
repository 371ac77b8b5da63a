use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::queue::QueueNodeId;

/// Reconciliation key of a laid-out queue. Issued once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeKey(u64);

impl Display for NodeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeKeyRegistry {
    last_issued: u64,
    keys: HashMap<QueueNodeId, NodeKey>,
    owners: HashMap<NodeKey, QueueNodeId>,
}

impl NodeKeyRegistry {
    pub fn key_for(&mut self, queue: QueueNodeId) -> NodeKey {
        if let Some(key) = self.keys.get(&queue) {
            return *key;
        }

        self.last_issued += 1;
        let key = NodeKey(self.last_issued);
        let previous_owner = self.owners.insert(key, queue);
        assert!(
            previous_owner.is_none(),
            "node key {key} issued to both {previous_owner:?} and {queue:?}"
        );
        self.keys.insert(queue, key);
        key
    }

    pub fn get(&self, queue: QueueNodeId) -> Option<NodeKey> {
        self.keys.get(&queue).copied()
    }

    pub fn queue_for(&self, key: NodeKey) -> Option<QueueNodeId> {
        self.owners.get(&key).copied()
    }

    /// Drops all assignments for a replaced tree; the counter keeps climbing
    /// so keys from the old tree are never handed out again.
    pub fn forget_all(&mut self) {
        self.keys.clear();
        self.owners.clear();
    }
}
