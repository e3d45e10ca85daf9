use debugcanvas_core::{Point, Vector, WorldRect};
use serde::{Deserialize, Serialize};

/// Maps world coordinates onto a pixel buffer bound to a world rectangle.
///
/// The scale is uniform (`min(W / bw, H / bh)`), so the world rectangle is
/// letterboxed rather than stretched. World +y is up, pixel +y is down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    bounds: WorldRect,
    /// Pixel buffer width, at least 1.
    width: f64,
    /// Pixel buffer height, at least 1.
    height: f64,
    /// Pixels per world unit.
    scale: f64,
}

impl Viewport {
    pub fn new(bounds: WorldRect, width: u32, height: u32) -> Self {
        let width = width.max(1) as f64;
        let height = height.max(1) as f64;
        let scale = (width / bounds.width).min(height / bounds.height);
        Self {
            bounds,
            width,
            height,
            scale,
        }
    }

    /// Like [`new`](Self::new) for fractional control sizes, rounded by [`pixel_dimension`].
    pub fn for_size(bounds: WorldRect, width: f64, height: f64) -> Self {
        Self::new(bounds, pixel_dimension(width), pixel_dimension(height))
    }

    pub fn bounds(&self) -> WorldRect {
        self.bounds
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// True when the bounds have a non-positive or non-finite extent on
    /// either axis, or cannot produce a usable scale.
    pub fn is_degenerate(&self) -> bool {
        let b = &self.bounds;
        let extent_ok = [b.x, b.y, b.width, b.height].iter().all(|v| v.is_finite())
            && b.width > 0.0
            && b.height > 0.0;
        !extent_ok || !self.scale.is_finite() || self.scale <= 0.0
    }

    /// Convert a world point to pixel coordinates.
    pub fn to_pixel(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.bounds.x) * self.scale,
            (p.y - self.bounds.y) * -self.scale + self.height,
        )
    }

    /// Convert a pixel coordinate back to world space. Exact inverse of [`to_pixel`](Self::to_pixel).
    pub fn to_world(&self, px: Point) -> Point {
        Point::new(
            px.x / self.scale + self.bounds.x,
            (px.y - self.height) / -self.scale + self.bounds.y,
        )
    }

    /// Pixel extent of a world-space vector, per axis, always non-negative.
    pub fn pixel_size(&self, v: Vector) -> Vector {
        let origin = self.to_pixel(Point::ORIGIN);
        let tip = self.to_pixel(Point::new(v.x, v.y));
        (origin - tip).abs()
    }

    /// Whether the box `center ± size/2` overlaps the pixel buffer on both axes.
    pub fn is_visible(&self, center: Point, size: Vector) -> bool {
        let half = size.half();
        let a = self.to_pixel(center - half);
        let b = self.to_pixel(center + half);

        let min_x = a.x.min(b.x);
        let max_x = a.x.max(b.x);
        let min_y = a.y.min(b.y);
        let max_y = a.y.max(b.y);

        let overlap_x = max_x > 0.0 && min_x < self.width;
        let overlap_y = max_y > 0.0 && min_y < self.height;
        overlap_x && overlap_y
    }

    /// The world rectangle actually covered by the pixel buffer.
    ///
    /// Wider than [`bounds`](Self::bounds) on one axis when the aspect ratios differ.
    pub fn visible_bounds(&self) -> WorldRect {
        let bottom_left = self.to_world(Point::new(0.0, self.height));
        WorldRect::new(
            bottom_left.x,
            bottom_left.y,
            self.width / self.scale,
            self.height / self.scale,
        )
    }
}

/// Round a control dimension to whole pixels, at least 1. NaN and
/// infinities also map to 1.
pub fn pixel_dimension(v: f64) -> u32 {
    if !v.is_finite() {
        return 1;
    }
    v.round().clamp(1.0, u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point, b: Point, eps: f64) {
        assert!(
            (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_scale_is_uniform_min() {
        let vp = Viewport::new(WorldRect::new(0.0, 0.0, 80.0, 45.0), 800, 450);
        assert!((vp.scale() - 10.0).abs() < 1e-10);

        let vp = Viewport::new(WorldRect::new(0.0, 0.0, 80.0, 45.0), 800, 600);
        assert!((vp.scale() - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_y_axis_is_flipped() {
        let vp = Viewport::new(WorldRect::new(0.0, 0.0, 80.0, 45.0), 800, 450);
        assert_close(vp.to_pixel(Point::new(0.0, 0.0)), Point::new(0.0, 450.0), 1e-10);
        assert_close(vp.to_pixel(Point::new(80.0, 45.0)), Point::new(800.0, 0.0), 1e-10);
    }

    #[test]
    fn test_inverse_law() {
        let bounds = [
            WorldRect::new(0.0, 0.0, 80.0, 45.0),
            WorldRect::new(-1000.0, 250.0, 3.5, 0.25),
            WorldRect::new(1e6, -1e6, 1e4, 2e3),
        ];
        let dims = [(1, 1), (800, 450), (3, 2000), (4096, 17)];
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, -15.0),
            Point::new(-1234.5, 987.25),
            Point::new(1e6 + 3.0, -1e6 + 7.0),
        ];
        for b in &bounds {
            for &(w, h) in &dims {
                let vp = Viewport::new(*b, w, h);
                for p in &points {
                    let back = vp.to_world(vp.to_pixel(*p));
                    let eps = 1e-8 * (1.0 + p.x.abs().max(p.y.abs()));
                    assert_close(back, *p, eps);
                }
            }
        }
    }

    #[test]
    fn test_dimensions_clamped() {
        let vp = Viewport::new(WorldRect::default(), 0, 0);
        assert!((vp.width() - 1.0).abs() < 1e-10);
        assert!((vp.height() - 1.0).abs() < 1e-10);
        assert!(!vp.is_degenerate());
    }

    #[test]
    fn test_pixel_dimension() {
        assert_eq!(pixel_dimension(0.0), 1);
        assert_eq!(pixel_dimension(-20.0), 1);
        assert_eq!(pixel_dimension(99.6), 100);
        assert_eq!(pixel_dimension(f64::NAN), 1);
        assert_eq!(pixel_dimension(f64::INFINITY), 1);
    }

    #[test]
    fn test_degenerate_bounds() {
        let vp = Viewport::new(WorldRect::new(0.0, 0.0, 0.0, 0.0), 800, 600);
        assert!(vp.is_degenerate());
        let vp = Viewport::new(WorldRect::new(0.0, 0.0, -10.0, 10.0), 800, 600);
        assert!(vp.is_degenerate());
    }

    #[test]
    fn test_zero_extent_on_one_axis_is_degenerate() {
        // The other axis alone still yields a finite scale.
        let vp = Viewport::new(WorldRect::new(0.0, 0.0, 0.0, 10.0), 800, 600);
        assert!((vp.scale() - 60.0).abs() < 1e-10);
        assert!(vp.is_degenerate());

        let vp = Viewport::new(WorldRect::new(0.0, 0.0, 10.0, 0.0), 800, 600);
        assert!(vp.is_degenerate());
        let vp = Viewport::new(WorldRect::new(f64::NAN, 0.0, 10.0, 10.0), 800, 600);
        assert!(vp.is_degenerate());
        let vp = Viewport::new(WorldRect::new(0.0, 0.0, f64::INFINITY, 10.0), 800, 600);
        assert!(vp.is_degenerate());
        assert!(!Viewport::new(WorldRect::new(0.0, 0.0, 10.0, 10.0), 800, 600).is_degenerate());
    }

    #[test]
    fn test_visibility_culling() {
        let vp = Viewport::new(WorldRect::new(0.0, 0.0, 80.0, 45.0), 800, 600);
        assert!(!vp.is_visible(Point::new(1000.0, 1000.0), Vector::new(1.0, 1.0)));
        assert!(vp.is_visible(Point::new(0.0, 0.0), Vector::new(1.0, 1.0)));
        // Entirely below the bottom edge.
        assert!(!vp.is_visible(Point::new(10.0, -20.0), Vector::new(1.0, 1.0)));
    }

    #[test]
    fn test_pixel_size() {
        let vp = Viewport::new(WorldRect::new(5.0, 5.0, 80.0, 45.0), 800, 450);
        let s = vp.pixel_size(Vector::new(100.0, -50.0));
        assert!((s.x - 1000.0).abs() < 1e-10);
        assert!((s.y - 500.0).abs() < 1e-10);
    }

    #[test]
    fn test_visible_bounds_letterbox() {
        let vp = Viewport::new(WorldRect::new(0.0, 0.0, 80.0, 45.0), 800, 600);
        let v = vp.visible_bounds();
        assert!((v.x - 0.0).abs() < 1e-10);
        assert!((v.y - 0.0).abs() < 1e-10);
        assert!((v.width - 80.0).abs() < 1e-10);
        // The bottom edge is pinned to bounds.y, so the extra height is above.
        assert!((v.height - 60.0).abs() < 1e-10);
    }
}
