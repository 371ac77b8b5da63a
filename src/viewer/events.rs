use std::time::Duration;

use crate::diagram::{HitTarget, QueueDiagram};
use crate::geometry::Point;
use crate::layout::registry::NodeKey;

/// Multiplier applied per scroll "line" when zooming with the wheel.
const WHEEL_ZOOM_STEP: f64 = 1.1;
/// Scroll points treated as one wheel line.
const WHEEL_LINE_POINTS: f64 = 50.0;

/// User intent on the canvas, decoupled from egui input types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasAction {
    Select(NodeKey),
    Toggle(NodeKey),
    Zoom { factor: f64, anchor: Point },
    Pan { dx: f64, dy: f64 },
    Fit,
}

pub fn action_for_click(hit: Option<HitTarget>) -> Option<CanvasAction> {
    match hit? {
        HitTarget::Body(key) => Some(CanvasAction::Select(key)),
        HitTarget::ToggleHandle(key) => Some(CanvasAction::Toggle(key)),
    }
}

/// Pinch factors win over wheel scrolling when both are present.
pub fn zoom_action(pinch: f64, scroll_y: f64, anchor: Point) -> Option<CanvasAction> {
    let factor = if (pinch - 1.0).abs() > f64::EPSILON {
        pinch
    } else if scroll_y != 0.0 {
        WHEEL_ZOOM_STEP.powf(scroll_y / WHEEL_LINE_POINTS)
    } else {
        return None;
    };
    Some(CanvasAction::Zoom { factor, anchor })
}

pub fn pan_action(dx: f64, dy: f64) -> Option<CanvasAction> {
    (dx != 0.0 || dy != 0.0).then_some(CanvasAction::Pan { dx, dy })
}

/// Applies an action and reports the node whose selection changed, if any.
pub fn apply_action(
    diagram: &mut QueueDiagram,
    action: CanvasAction,
    now: Duration,
) -> Option<NodeKey> {
    match action {
        CanvasAction::Select(key) => {
            let change = diagram.select(key)?;
            change.highlighted
        }
        CanvasAction::Toggle(key) => {
            diagram.toggle(key, now);
            None
        }
        CanvasAction::Zoom { factor, anchor } => {
            diagram.zoom(factor, anchor, now);
            None
        }
        CanvasAction::Pan { dx, dy } => {
            diagram.pan(dx, dy, now);
            None
        }
        CanvasAction::Fit => {
            diagram.fit(now);
            None
        }
    }
}
