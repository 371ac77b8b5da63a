use crate::layout::registry::NodeKey;

/// At most one selected node, plus whether its detail panel is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    selected: Option<NodeKey>,
    detail_visible: bool,
}

/// What a renderer has to restyle after a selection click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionChange {
    pub cleared: Option<NodeKey>,
    pub highlighted: Option<NodeKey>,
    pub detail_visible: bool,
}

impl Selection {
    pub fn selected(&self) -> Option<NodeKey> {
        self.selected
    }

    pub fn detail_visible(&self) -> bool {
        self.detail_visible
    }

    /// Selecting the current node again only toggles its detail panel.
    pub fn select(&mut self, key: NodeKey) -> SelectionChange {
        if self.selected == Some(key) {
            self.detail_visible = !self.detail_visible;
            return SelectionChange {
                cleared: None,
                highlighted: None,
                detail_visible: self.detail_visible,
            };
        }

        let cleared = self.selected.replace(key);
        self.detail_visible = true;
        SelectionChange {
            cleared,
            highlighted: Some(key),
            detail_visible: true,
        }
    }

    /// Puts back a selection carried over from an earlier tree.
    pub fn restore(&mut self, key: NodeKey, detail_visible: bool) {
        self.selected = Some(key);
        self.detail_visible = detail_visible;
    }

    pub fn clear(&mut self) -> Option<NodeKey> {
        self.detail_visible = false;
        self.selected.take()
    }

    /// Drops the selection if its node no longer exists.
    pub fn retain(&mut self, exists: impl Fn(NodeKey) -> bool) {
        if self.selected.is_some_and(|key| !exists(key)) {
            self.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::registry::NodeKeyRegistry;
    use crate::queue::QueueTree;
    use crate::test_support::sample_queue_response;

    use super::{Selection, SelectionChange};

    #[test]
    fn selecting_another_node_clears_the_previous_one() {
        let tree = QueueTree::from_response(&sample_queue_response());
        let mut registry = NodeKeyRegistry::default();
        let ids = tree.visible_preorder();
        let first = registry.key_for(ids[0]);
        let second = registry.key_for(ids[1]);
        let mut selection = Selection::default();

        assert_eq!(
            selection.select(first),
            SelectionChange {
                cleared: None,
                highlighted: Some(first),
                detail_visible: true
            }
        );
        assert_eq!(
            selection.select(second),
            SelectionChange {
                cleared: Some(first),
                highlighted: Some(second),
                detail_visible: true
            }
        );
        assert_eq!(selection.selected(), Some(second));
    }

    #[test]
    fn selecting_same_node_toggles_detail_only() {
        let tree = QueueTree::from_response(&sample_queue_response());
        let mut registry = NodeKeyRegistry::default();
        let key = registry.key_for(tree.root().expect("root"));
        let mut selection = Selection::default();

        selection.select(key);
        let change = selection.select(key);
        assert_eq!(change.cleared, None);
        assert_eq!(change.highlighted, None);
        assert!(!change.detail_visible);
        assert_eq!(selection.selected(), Some(key));

        assert!(selection.select(key).detail_visible);
    }

    #[test]
    fn retain_drops_vanished_selection() {
        let tree = QueueTree::from_response(&sample_queue_response());
        let mut registry = NodeKeyRegistry::default();
        let key = registry.key_for(tree.root().expect("root"));
        let mut selection = Selection::default();

        selection.select(key);
        selection.retain(|candidate| candidate == key);
        assert_eq!(selection.selected(), Some(key));

        selection.retain(|_| false);
        assert_eq!(selection.selected(), None);
        assert!(!selection.detail_visible());
    }
}
