use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 2D point with floating-point coordinates, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// Fixed output size that every aligned image, warped image and mean
/// layout of a run lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Axis-aligned bounds of a point set: top-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A facial landmark set: one point per semantically fixed feature.
///
/// Every shape processed in one batch must carry the same number of
/// landmarks, in the same order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub points: Vec<Point>,
}

impl Shape {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn num_landmarks(&self) -> usize {
        self.points.len()
    }

    /// An empty shape is the detector's "no face found" signal.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box of all landmarks, or `None` for an empty shape.
    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Bounds {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    /// Scale every landmark about the origin, then shift by `-offset`.
    pub fn scaled_shifted(&self, scale: f32, offset: Point) -> Shape {
        Shape::new(self.points.iter().map(|p| *p * scale - offset).collect())
    }

    /// Convex hull in counter-clockwise order (monotone chain).
    pub fn convex_hull(&self) -> Vec<Point> {
        let mut pts = self.points.clone();
        pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        pts.dedup();
        if pts.len() < 3 {
            return pts;
        }

        let mut lower = half_hull(pts.iter().copied());
        let mut upper = half_hull(pts.iter().rev().copied());
        lower.pop();
        upper.pop();
        lower.extend(upper);
        lower
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

fn half_hull(points: impl Iterator<Item = Point>) -> Vec<Point> {
    let mut chain: Vec<Point> = Vec::new();
    for p in points {
        while chain.len() >= 2 && cross(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0.0 {
            chain.pop();
        }
        chain.push(p);
    }
    chain
}

/// Z component of `(b - a) x (c - a)`; positive when a, b, c turn counter-clockwise.
pub(crate) fn cross(a: Point, b: Point, c: Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Calculate the area of a polygon using the shoelace formula.
pub(crate) fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = points.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }

    (area / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(3.0, 4.0);

        let sum = a + b;
        assert_eq!(sum.x, 4.0);
        assert_eq!(sum.y, 6.0);

        let diff = b - a;
        assert_eq!(diff.x, 2.0);
        assert_eq!(diff.y, 2.0);

        let scaled = a * 2.0;
        assert_eq!(scaled.x, 2.0);
        assert_eq!(scaled.y, 4.0);
    }

    #[test]
    fn frame_rejects_zero_extent() {
        assert!(Frame::new(500, 600).is_ok());
        assert!(matches!(
            Frame::new(0, 600),
            Err(Error::InvalidSize { width: 0, height: 600 })
        ));
    }

    #[test]
    fn shape_bounds() {
        let shape = Shape::new(vec![
            Point::new(10.0, 40.0),
            Point::new(30.0, 20.0),
            Point::new(20.0, 60.0),
        ]);
        let b = shape.bounds().unwrap();
        assert_eq!(b, Bounds { x: 10.0, y: 20.0, width: 20.0, height: 40.0 });
        assert_eq!(b.center(), Point::new(20.0, 40.0));

        assert!(Shape::default().bounds().is_none());
    }

    #[test]
    fn scaled_shifted_maps_every_point() {
        let shape = Shape::new(vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
        let moved = shape.scaled_shifted(2.0, Point::new(1.0, 1.0));
        assert_eq!(moved.points, vec![Point::new(1.0, 3.0), Point::new(5.0, 7.0)]);
    }

    #[test]
    fn convex_hull_drops_interior_points() {
        let shape = Shape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(2.0, 1.0), // interior
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
            Point::new(2.0, 0.0), // on an edge
        ]);
        let hull = shape.convex_hull();
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point::new(2.0, 1.0)));
        assert!((polygon_area(&hull) - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_polygon_area_triangle() {
        let tri = [Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(0.0, 3.0)];
        assert!((polygon_area(&tri) - 6.0).abs() < 1e-6);
    }

    #[test]
    fn cross_sign_follows_orientation() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        let c = Point::new(0.0, 1.0);
        assert!(cross(a, b, c) > 0.0);
        assert!(cross(a, c, b) < 0.0);
        assert_eq!(cross(a, b, Point::new(2.0, 0.0)), 0.0);
    }
}
