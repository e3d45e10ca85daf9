use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A 2D point in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint between `self` and `other`.
    pub fn midpoint(&self, other: &Point) -> Self {
        Self {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
        }
    }
}

/// A 2D extent or offset in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// A square extent.
    pub fn splat(v: f64) -> Self {
        Self { x: v, y: v }
    }

    pub fn half(&self) -> Self {
        Self {
            x: self.x * 0.5,
            y: self.y * 0.5,
        }
    }

    pub fn abs(&self) -> Self {
        Self {
            x: self.x.abs(),
            y: self.y.abs(),
        }
    }
}

impl Add<Vector> for Point {
    type Output = Point;

    fn add(self, rhs: Vector) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub<Vector> for Point {
    type Output = Point;

    fn sub(self, rhs: Vector) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Sub<Point> for Point {
    type Output = Vector;

    fn sub(self, rhs: Point) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Box spanning `center ± half`, with corners ordered regardless of sign.
    pub fn around(center: Point, half: Vector) -> Self {
        let a = center - half;
        let b = center + half;
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// The world-space rectangle a viewport is bound to.
///
/// `(x, y)` is the lower-left corner in world units (world +y is up).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WorldRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_bbox(bbox: &BBox) -> Self {
        Self::new(bbox.min.x, bbox.min.y, bbox.width(), bbox.height())
    }

    /// Flip a negative height so the rectangle covers the same span with
    /// a non-negative height. Width is left as given.
    pub fn normalized(&self) -> Self {
        if self.height >= 0.0 {
            *self
        } else {
            Self::new(self.x, self.y + self.height, self.width, -self.height)
        }
    }

    pub fn offset(&self, delta: Vector) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }

    /// Scale the rectangle about `anchor`, which keeps its relative position.
    pub fn scale_about(&self, anchor: Point, factor: f64) -> Self {
        Self::new(
            anchor.x + (self.x - anchor.x) * factor,
            anchor.y + (self.y - anchor.y) * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    pub fn to_bbox(&self) -> BBox {
        BBox::from_points(&[
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y + self.height),
        ])
        .unwrap_or(BBox::new(Point::ORIGIN, Point::ORIGIN))
    }
}

impl Default for WorldRect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 80.0, 45.0)
    }
}
