use std::collections::HashMap;

use serde::Serialize;

use crate::geometry::Point;
use crate::layout::registry::NodeKey;
use crate::layout::{LayoutSnapshot, Link};

pub mod motion;
pub mod scene;
pub mod selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Enter,
    Update,
    Exit,
}

/// Where entering elements grow from and exiting elements shrink to: the
/// node whose toggle caused the pass, before and after the pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusPoint {
    pub prior: Point,
    pub current: Point,
}

impl FocusPoint {
    pub fn fixed(at: Point) -> Self {
        Self {
            prior: at,
            current: at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransition {
    pub key: NodeKey,
    pub phase: Phase,
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkEnds {
    pub source: Point,
    pub target: Point,
}

impl LinkEnds {
    pub fn collapsed(at: Point) -> Self {
        Self {
            source: at,
            target: at,
        }
    }

    fn of(link: &Link) -> Self {
        Self {
            source: link.source_position,
            target: link.target_position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkTransition {
    /// Key of the link's child node.
    pub key: NodeKey,
    pub source: NodeKey,
    pub phase: Phase,
    pub from: LinkEnds,
    pub to: LinkEnds,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcilePlan {
    pub nodes: Vec<NodeTransition>,
    pub links: Vec<LinkTransition>,
}

impl ReconcilePlan {
    pub fn count(&self, phase: Phase) -> usize {
        self.nodes
            .iter()
            .filter(|transition| transition.phase == phase)
            .count()
    }
}

/// Classifies nodes and links of `next` against `previous` by key.
pub fn reconcile(
    previous: &LayoutSnapshot,
    next: &LayoutSnapshot,
    focus: FocusPoint,
) -> ReconcilePlan {
    let previous_nodes = previous
        .nodes
        .iter()
        .map(|node| (node.key, node.position()))
        .collect::<HashMap<_, _>>();
    let next_keys = next
        .nodes
        .iter()
        .map(|node| node.key)
        .collect::<std::collections::HashSet<_>>();

    let mut nodes = next
        .nodes
        .iter()
        .map(|node| match previous_nodes.get(&node.key) {
            Some(old) => NodeTransition {
                key: node.key,
                phase: Phase::Update,
                from: *old,
                to: node.position(),
            },
            None => NodeTransition {
                key: node.key,
                phase: Phase::Enter,
                from: focus.prior,
                to: node.position(),
            },
        })
        .collect::<Vec<_>>();
    nodes.extend(
        previous
            .nodes
            .iter()
            .filter(|node| !next_keys.contains(&node.key))
            .map(|node| NodeTransition {
                key: node.key,
                phase: Phase::Exit,
                from: node.position(),
                to: focus.current,
            }),
    );

    let previous_links = previous
        .links
        .iter()
        .map(|link| (link.key(), link))
        .collect::<HashMap<_, _>>();
    let mut links = next
        .links
        .iter()
        .map(|link| match previous_links.get(&link.key()) {
            Some(old) => LinkTransition {
                key: link.key(),
                source: link.source,
                phase: Phase::Update,
                from: LinkEnds::of(old),
                to: LinkEnds::of(link),
            },
            None => LinkTransition {
                key: link.key(),
                source: link.source,
                phase: Phase::Enter,
                from: LinkEnds::collapsed(focus.prior),
                to: LinkEnds::of(link),
            },
        })
        .collect::<Vec<_>>();
    links.extend(
        previous
            .links
            .iter()
            .filter(|link| !next_keys.contains(&link.key()))
            .map(|link| LinkTransition {
                key: link.key(),
                source: link.source,
                phase: Phase::Exit,
                from: LinkEnds::of(link),
                to: LinkEnds::collapsed(focus.current),
            }),
    );

    ReconcilePlan { nodes, links }
}
