use std::time::Duration;

use serde::Serialize;

use crate::geometry::{Bounds, Point, ease_cubic_in_out, progress};

pub const FIT_PADDING: f64 = 0.9;
pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Diagram-to-screen mapping: `screen = diagram * scale + translate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub scale: f64,
    pub translate: Point,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Point::default(),
        }
    }
}

impl Transform {
    pub fn apply(&self, point: Point) -> Point {
        Point::new(
            point.x * self.scale + self.translate.x,
            point.y * self.scale + self.translate.y,
        )
    }

    pub fn invert(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.translate.x) / self.scale,
            (screen.y - self.translate.y) / self.scale,
        )
    }

    /// Transform that places `diagram_point` at `screen_point` with the given scale.
    fn anchored(scale: f64, diagram_point: Point, screen_point: Point) -> Self {
        Self {
            scale,
            translate: Point::new(
                screen_point.x - diagram_point.x * scale,
                screen_point.y - diagram_point.y * scale,
            ),
        }
    }
}

pub fn fit_to_screen(bounds: Bounds, viewport: ViewportSize) -> Transform {
    let ratio = |available: f64, extent: f64| {
        if extent > 0.0 {
            available / extent
        } else {
            f64::INFINITY
        }
    };
    let raw = ratio(viewport.width, bounds.width).min(ratio(viewport.height, bounds.height));
    let scale = if raw.is_finite() && raw > 0.0 {
        raw * FIT_PADDING
    } else {
        1.0
    };
    Transform::anchored(scale, bounds.center(), viewport.center())
}

/// Centre first at the current scale, then scale about the centred point.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FitAnimation {
    start: Duration,
    duration: Duration,
    from: Transform,
    target_scale: f64,
    bounds_center: Point,
    viewport_center: Point,
}

impl FitAnimation {
    fn sample(&self, now: Duration) -> Transform {
        let t = progress(now, self.start, self.duration);
        if t < 0.5 {
            let centered = Transform::anchored(
                self.from.scale,
                self.bounds_center,
                self.viewport_center,
            );
            let eased = ease_cubic_in_out(t * 2.0);
            Transform {
                scale: self.from.scale,
                translate: self.from.translate.lerp(centered.translate, eased),
            }
        } else {
            let eased = ease_cubic_in_out((t - 0.5) * 2.0);
            let scale = self.from.scale + (self.target_scale - self.from.scale) * eased;
            Transform::anchored(scale, self.bounds_center, self.viewport_center)
        }
    }

    fn is_finished(&self, now: Duration) -> bool {
        progress(now, self.start, self.duration) >= 1.0
    }

    fn target(&self) -> Transform {
        Transform::anchored(self.target_scale, self.bounds_center, self.viewport_center)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportController {
    size: ViewportSize,
    transform: Transform,
    animation: Option<FitAnimation>,
}

impl ViewportController {
    pub fn new(size: ViewportSize) -> Self {
        Self {
            size,
            transform: Transform::default(),
            animation: None,
        }
    }

    pub fn size(&self) -> ViewportSize {
        self.size
    }

    pub fn resize(&mut self, size: ViewportSize) {
        self.size = size;
    }

    /// Starts an animated fit; an in-flight fit is replaced from its current state.
    pub fn begin_fit(&mut self, bounds: Bounds, now: Duration, duration: Duration) -> Transform {
        let from = self.transform_at(now);
        let target = fit_to_screen(bounds, self.size);
        self.animation = Some(FitAnimation {
            start: now,
            duration,
            from,
            target_scale: target.scale,
            bounds_center: bounds.center(),
            viewport_center: self.size.center(),
        });
        target
    }

    pub fn transform_at(&mut self, now: Duration) -> Transform {
        let Some(animation) = self.animation else {
            return self.transform;
        };
        if animation.is_finished(now) {
            self.transform = animation.target();
            self.animation = None;
            return self.transform;
        }
        animation.sample(now)
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Zooms about a screen-space anchor; the result is clamped to the zoom range.
    pub fn zoom(&mut self, factor: f64, anchor: Point, now: Duration) {
        let current = self.settle(now);
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let scale = (current.scale * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.transform = Transform::anchored(scale, current.invert(anchor), anchor);
    }

    pub fn pan(&mut self, dx: f64, dy: f64, now: Duration) {
        let current = self.settle(now);
        self.transform = Transform {
            scale: current.scale,
            translate: Point::new(current.translate.x + dx, current.translate.y + dy),
        };
    }

    fn settle(&mut self, now: Duration) -> Transform {
        self.transform = self.transform_at(now);
        self.animation = None;
        self.transform
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::geometry::{Bounds, Point};

    use super::{MAX_ZOOM, MIN_ZOOM, ViewportController, ViewportSize, fit_to_screen};

    const EPSILON: f64 = 1e-9;

    fn bounds(x: f64, y: f64, width: f64, height: f64) -> Bounds {
        Bounds {
            x,
            y,
            width,
            height,
        }
    }

    fn square_viewport() -> ViewportSize {
        ViewportSize {
            width: 1000.0,
            height: 1000.0,
        }
    }

    #[test]
    fn fit_uses_limiting_axis_with_padding() {
        let transform = fit_to_screen(bounds(0.0, 0.0, 100.0, 200.0), square_viewport());
        assert!((transform.scale - 4.5).abs() < EPSILON);
    }

    #[test]
    fn fit_centres_the_diagram() {
        let diagram = bounds(-150.0, 0.0, 300.0, 900.0);
        let transform = fit_to_screen(diagram, square_viewport());
        let center = transform.apply(diagram.center());
        assert!((center.x - 500.0).abs() < EPSILON);
        assert!((center.y - 500.0).abs() < EPSILON);
    }

    #[test]
    fn fit_of_degenerate_bounds_keeps_unit_scale() {
        let transform = fit_to_screen(bounds(10.0, 10.0, 0.0, 0.0), square_viewport());
        assert_eq!(transform.scale, 1.0);
        assert_eq!(transform.apply(Point::new(10.0, 10.0)), Point::new(500.0, 500.0));
    }

    #[test]
    fn fit_animation_translates_before_scaling() {
        let mut viewport = ViewportController::new(square_viewport());
        let diagram = bounds(0.0, 0.0, 100.0, 200.0);
        let target = viewport.begin_fit(diagram, Duration::ZERO, Duration::from_millis(1000));

        let halfway = viewport.transform_at(Duration::from_millis(499));
        assert_eq!(halfway.scale, 1.0);

        let centered = viewport.transform_at(Duration::from_millis(500));
        let center = centered.apply(diagram.center());
        assert!((center.x - 500.0).abs() < EPSILON);
        assert!((center.y - 500.0).abs() < EPSILON);

        let scaling = viewport.transform_at(Duration::from_millis(750));
        assert!(scaling.scale > 1.0 && scaling.scale < target.scale);
        let center = scaling.apply(diagram.center());
        assert!((center.x - 500.0).abs() < EPSILON);

        let done = viewport.transform_at(Duration::from_millis(1000));
        assert_eq!(done, target);
        assert!(!viewport.is_animating());
    }

    #[test]
    fn zoom_is_clamped_and_keeps_anchor_fixed() {
        let mut viewport = ViewportController::new(square_viewport());
        let anchor = Point::new(200.0, 300.0);
        let before = viewport.transform_at(Duration::ZERO).invert(anchor);

        viewport.zoom(2.0, anchor, Duration::ZERO);
        let after = viewport.transform_at(Duration::ZERO);
        assert_eq!(after.scale, 2.0);
        let mapped = after.apply(before);
        assert!((mapped.x - anchor.x).abs() < EPSILON);
        assert!((mapped.y - anchor.y).abs() < EPSILON);

        viewport.zoom(100.0, anchor, Duration::ZERO);
        assert_eq!(viewport.transform_at(Duration::ZERO).scale, MAX_ZOOM);
        viewport.zoom(0.0001, anchor, Duration::ZERO);
        assert_eq!(viewport.transform_at(Duration::ZERO).scale, MIN_ZOOM);
    }

    #[test]
    fn gestures_compose_with_fit_and_cancel_animation() {
        let mut viewport = ViewportController::new(square_viewport());
        let diagram = bounds(0.0, 0.0, 100.0, 200.0);
        let fitted = viewport.begin_fit(diagram, Duration::ZERO, Duration::from_millis(10));
        assert_eq!(viewport.transform_at(Duration::from_millis(10)), fitted);

        viewport.pan(15.0, -5.0, Duration::from_millis(20));
        let panned = viewport.transform_at(Duration::from_millis(20));
        assert_eq!(panned.scale, fitted.scale);
        assert_eq!(panned.translate.x, fitted.translate.x + 15.0);
        assert_eq!(panned.translate.y, fitted.translate.y - 5.0);

        viewport.begin_fit(diagram, Duration::from_millis(30), Duration::from_millis(100));
        viewport.pan(1.0, 0.0, Duration::from_millis(40));
        assert!(!viewport.is_animating());
    }
}
