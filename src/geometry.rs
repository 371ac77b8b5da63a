use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, to: Self, t: f64) -> Self {
        Self {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

/// Axis-aligned box in diagram units; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn union(self, other: Self) -> Self {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }
}

/// Normalised progress of a time box, clamped to `[0, 1]`.
pub fn progress(now: Duration, start: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_sub(start).as_secs_f64();
    (elapsed / duration.as_secs_f64()).clamp(0.0, 1.0)
}

pub fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Bounds, Point, ease_cubic_in_out, progress};

    #[test]
    fn easing_hits_endpoints_and_midpoint() {
        assert_eq!(ease_cubic_in_out(0.0), 0.0);
        assert_eq!(ease_cubic_in_out(0.5), 0.5);
        assert_eq!(ease_cubic_in_out(1.0), 1.0);
        assert!(ease_cubic_in_out(0.25) < 0.25);
        assert!(ease_cubic_in_out(0.75) > 0.75);
    }

    #[test]
    fn progress_is_clamped() {
        let start = Duration::from_millis(100);
        let duration = Duration::from_millis(200);
        assert_eq!(progress(Duration::from_millis(50), start, duration), 0.0);
        assert_eq!(progress(Duration::from_millis(200), start, duration), 0.5);
        assert_eq!(progress(Duration::from_millis(900), start, duration), 1.0);
        assert_eq!(progress(start, start, Duration::ZERO), 1.0);
    }

    #[test]
    fn union_covers_both_boxes() {
        let a = Bounds {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        let b = Bounds {
            x: -5.0,
            y: 20.0,
            width: 5.0,
            height: 5.0,
        };
        let merged = a.union(b);
        assert_eq!(
            merged,
            Bounds {
                x: -5.0,
                y: 0.0,
                width: 15.0,
                height: 25.0
            }
        );
        assert!(merged.contains(Point::new(-5.0, 25.0)));
        assert!(!merged.contains(Point::new(11.0, 0.0)));
        assert_eq!(merged.center(), Point::new(2.5, 12.5));
    }
}
