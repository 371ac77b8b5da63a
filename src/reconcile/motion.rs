use std::time::Duration;

use crate::geometry::{Point, ease_cubic_in_out, progress};

/// Per-entity animation state: idle at a point, or easing between two.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Idle {
        at: Point,
    },
    Animating {
        start: Duration,
        duration: Duration,
        from: Point,
        to: Point,
    },
}

impl Motion {
    pub fn idle(at: Point) -> Self {
        Self::Idle { at }
    }

    pub fn between(from: Point, to: Point, start: Duration, duration: Duration) -> Self {
        if from == to || duration.is_zero() {
            return Self::Idle { at: to };
        }
        Self::Animating {
            start,
            duration,
            from,
            to,
        }
    }

    pub fn position(&self, now: Duration) -> Point {
        match *self {
            Self::Idle { at } => at,
            Self::Animating {
                start,
                duration,
                from,
                to,
            } => {
                let t = progress(now, start, duration);
                if t >= 1.0 {
                    return to;
                }
                from.lerp(to, ease_cubic_in_out(t))
            }
        }
    }

    /// Eased completion in `[0, 1]`; idle motions are complete.
    pub fn fraction(&self, now: Duration) -> f64 {
        match *self {
            Self::Idle { .. } => 1.0,
            Self::Animating {
                start, duration, ..
            } => ease_cubic_in_out(progress(now, start, duration)),
        }
    }

    /// Settles to `Idle` once the time box has elapsed. Returns `true` when idle.
    pub fn advance(&mut self, now: Duration) -> bool {
        if let Self::Animating {
            start,
            duration,
            to,
            ..
        } = *self
        {
            if progress(now, start, duration) < 1.0 {
                return false;
            }
            *self = Self::Idle { at: to };
        }
        true
    }

    /// Restarts toward `to` from wherever the entity currently is.
    pub fn retarget(&mut self, to: Point, now: Duration, duration: Duration) {
        let from = self.position(now);
        *self = Self::between(from, to, now, duration);
    }
}
