use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::geometry::Point;
use crate::layout::registry::NodeKey;

use super::motion::Motion;
use super::{Phase, ReconcilePlan};

#[derive(Debug, Clone, Copy, PartialEq)]
struct SceneNode {
    phase: Phase,
    motion: Motion,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SceneLink {
    source: NodeKey,
    phase: Phase,
    source_motion: Motion,
    target_motion: Motion,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameNode {
    pub key: NodeKey,
    pub phase: Phase,
    pub position: Point,
    pub opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameLink {
    pub key: NodeKey,
    pub source: NodeKey,
    pub phase: Phase,
    pub source_position: Point,
    pub target_position: Point,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SceneFrame {
    pub nodes: Vec<FrameNode>,
    pub links: Vec<FrameLink>,
    pub animating: bool,
}

impl SceneFrame {
    pub fn node(&self, key: NodeKey) -> Option<&FrameNode> {
        self.nodes.iter().find(|node| node.key == key)
    }
}

/// Animated node/link set. Applying a plan mid-flight restarts every touched
/// element from its current interpolated position.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    duration: Duration,
    nodes: BTreeMap<NodeKey, SceneNode>,
    links: BTreeMap<NodeKey, SceneLink>,
}

impl Scene {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            nodes: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
    }

    pub fn apply(&mut self, plan: &ReconcilePlan, now: Duration) {
        for transition in &plan.nodes {
            match self.nodes.get_mut(&transition.key) {
                Some(node) => {
                    node.phase = transition.phase;
                    node.motion.retarget(transition.to, now, self.duration);
                }
                None => {
                    self.nodes.insert(
                        transition.key,
                        SceneNode {
                            phase: transition.phase,
                            motion: Motion::between(
                                transition.from,
                                transition.to,
                                now,
                                self.duration,
                            ),
                        },
                    );
                }
            }
        }

        for transition in &plan.links {
            match self.links.get_mut(&transition.key) {
                Some(link) => {
                    link.source = transition.source;
                    link.phase = transition.phase;
                    link.source_motion
                        .retarget(transition.to.source, now, self.duration);
                    link.target_motion
                        .retarget(transition.to.target, now, self.duration);
                }
                None => {
                    self.links.insert(
                        transition.key,
                        SceneLink {
                            source: transition.source,
                            phase: transition.phase,
                            source_motion: Motion::between(
                                transition.from.source,
                                transition.to.source,
                                now,
                                self.duration,
                            ),
                            target_motion: Motion::between(
                                transition.from.target,
                                transition.to.target,
                                now,
                                self.duration,
                            ),
                        },
                    );
                }
            }
        }
    }

    /// Advances every motion, removes finished exits and returns what to draw.
    pub fn tick(&mut self, now: Duration) -> SceneFrame {
        let mut animating = false;

        let mut nodes = Vec::with_capacity(self.nodes.len());
        self.nodes.retain(|key, node| {
            let fraction = node.motion.fraction(now);
            let position = node.motion.position(now);
            let settled = node.motion.advance(now);
            if settled && node.phase == Phase::Exit {
                return false;
            }
            let opacity = match node.phase {
                Phase::Enter => fraction,
                Phase::Update => 1.0,
                Phase::Exit => 1.0 - fraction,
            };
            if settled && node.phase == Phase::Enter {
                node.phase = Phase::Update;
            }
            animating |= !settled;
            nodes.push(FrameNode {
                key: *key,
                phase: node.phase,
                position,
                opacity,
            });
            true
        });

        let mut links = Vec::with_capacity(self.links.len());
        self.links.retain(|key, link| {
            let source_position = link.source_motion.position(now);
            let target_position = link.target_motion.position(now);
            let settled = link.source_motion.advance(now) & link.target_motion.advance(now);
            if settled && link.phase == Phase::Exit {
                return false;
            }
            if settled && link.phase == Phase::Enter {
                link.phase = Phase::Update;
            }
            animating |= !settled;
            links.push(FrameLink {
                key: *key,
                source: link.source,
                phase: link.phase,
                source_position,
                target_position,
            });
            true
        });

        SceneFrame {
            nodes,
            links,
            animating,
        }
    }
}
