//! Delaunay triangulation of a landmark layout.
//!
//! Bowyer–Watson: points are inserted one at a time into a triangulation
//! seeded with an enclosing super-triangle; every triangle whose circumcircle
//! contains the new point is removed and the cavity is re-fanned from that
//! point. Triangles touching the super-triangle are dropped at the end.

use crate::types::Point;

/// Margin of the super-triangle, in multiples of the layout's larger extent.
const ENVELOPE_MARGIN: f64 = 100.0;

/// Points closer than this are treated as the same landmark.
const DUPLICATE_EPSILON: f64 = 1e-9;

/// Vertex indices into the triangulated point list, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub v0: usize,
    pub v1: usize,
    pub v2: usize,
}

impl Triangle {
    pub fn indices(&self) -> [usize; 3] {
        [self.v0, self.v1, self.v2]
    }
}

#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    triangles: Vec<Triangle>,
    num_points: usize,
}

struct Cell {
    tri: Triangle,
    cx: f64,
    cy: f64,
    r2: f64,
}

impl Cell {
    fn new(coords: &[(f64, f64)], a: usize, b: usize, c: usize) -> Self {
        // Keep every triangle counter-clockwise
        let (b, c) = if orient(coords[a], coords[b], coords[c]) < 0.0 {
            (c, b)
        } else {
            (b, c)
        };
        let (cx, cy, r2) = circumcircle(coords[a], coords[b], coords[c]);
        Self {
            tri: Triangle { v0: a, v1: b, v2: c },
            cx,
            cy,
            r2,
        }
    }

    fn circle_contains(&self, p: (f64, f64)) -> bool {
        let dx = p.0 - self.cx;
        let dy = p.1 - self.cy;
        dx * dx + dy * dy < self.r2
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let t = self.tri;
        [(t.v0, t.v1), (t.v1, t.v2), (t.v2, t.v0)]
    }
}

impl Triangulation {
    /// Triangulate `points`. Triangle vertices index into `points`.
    ///
    /// Duplicate and non-finite points are left out; fewer than three usable
    /// points give an empty triangulation.
    pub fn find_delaunay_triangulation(points: &[Point]) -> Triangulation {
        let n = points.len();
        let mut result = Triangulation {
            triangles: Vec::new(),
            num_points: n,
        };

        let usable = usable_indices(points);
        if usable.len() < 3 {
            return result;
        }

        // Work relative to the layout center to keep circumcircles well conditioned
        let (min_x, min_y, max_x, max_y) = usable.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x0, y0, x1, y1), &i| {
                let (x, y) = (points[i].x as f64, points[i].y as f64);
                (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
            },
        );
        let (mid_x, mid_y) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
        let extent = (max_x - min_x).max(max_y - min_y).max(1.0);

        let mut coords: Vec<(f64, f64)> = points
            .iter()
            .map(|p| (p.x as f64 - mid_x, p.y as f64 - mid_y))
            .collect();
        let m = ENVELOPE_MARGIN * extent;
        coords.push((-m, -extent));
        coords.push((0.0, m));
        coords.push((m, -extent));

        let mut cells = vec![Cell::new(&coords, n, n + 1, n + 2)];

        for &i in &usable {
            let p = coords[i];
            let (bad, good): (Vec<Cell>, Vec<Cell>) =
                cells.into_iter().partition(|cell| cell.circle_contains(p));
            cells = good;

            let edges: Vec<(usize, usize)> = bad.iter().flat_map(Cell::edges).collect();
            for k in 0..edges.len() {
                let (a, b) = edges[k];
                let shared = edges
                    .iter()
                    .enumerate()
                    .any(|(j, &(c, d))| j != k && ((a == c && b == d) || (a == d && b == c)));
                if !shared {
                    cells.push(Cell::new(&coords, a, b, i));
                }
            }
        }

        result.triangles = cells
            .into_iter()
            .map(|cell| cell.tri)
            .filter(|t| t.v0 < n && t.v1 < n && t.v2 < n)
            .collect();
        result
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Number of points the triangulation was built from.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

fn usable_indices(points: &[Point]) -> Vec<usize> {
    let mut usable: Vec<usize> = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        if !p.x.is_finite() || !p.y.is_finite() {
            continue;
        }
        let duplicate = usable.iter().any(|&j| {
            let q = points[j];
            ((p.x - q.x) as f64).abs() < DUPLICATE_EPSILON && ((p.y - q.y) as f64).abs() < DUPLICATE_EPSILON
        });
        if !duplicate {
            usable.push(i);
        }
    }
    usable
}

fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Center and squared radius; collinear triples get an infinite circle so the
/// next insertion always removes them.
fn circumcircle(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> (f64, f64, f64) {
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < 1e-12 {
        return (0.0, 0.0, f64::INFINITY);
    }
    let a2 = a.0 * a.0 + a.1 * a.1;
    let b2 = b.0 * b.0 + b.1 * b.1;
    let c2 = c.0 * c.0 + c.1 * c.1;
    let ux = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
    let uy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
    let r2 = (a.0 - ux).powi(2) + (a.1 - uy).powi(2);
    (ux, uy, r2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{polygon_area, Shape};

    fn pts(coords: &[(f32, f32)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn total_area(points: &[Point], tri: &Triangulation) -> f32 {
        tri.triangles()
            .iter()
            .map(|t| polygon_area(&[points[t.v0], points[t.v1], points[t.v2]]))
            .sum()
    }

    /// Deterministic scatter without pulling in a RNG crate.
    fn scatter(n: usize, seed: u64) -> Vec<Point> {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) % 10_000) as f32 / 10.0
        };
        (0..n).map(|_| Point::new(next(), next())).collect()
    }

    #[test]
    fn square_splits_into_two_triangles() {
        let points = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let tri = Triangulation::find_delaunay_triangulation(&points);
        assert_eq!(tri.triangles().len(), 2);
        assert!((total_area(&points, &tri) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn center_point_fans_square() {
        let points = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (5.0, 5.0)]);
        let tri = Triangulation::find_delaunay_triangulation(&points);
        assert_eq!(tri.triangles().len(), 4);
        assert!(tri.triangles().iter().all(|t| t.indices().contains(&4)));
    }

    #[test]
    fn triangles_are_counter_clockwise() {
        let points = scatter(40, 7);
        let tri = Triangulation::find_delaunay_triangulation(&points);
        for t in tri.triangles() {
            let (a, b, c) = (points[t.v0], points[t.v1], points[t.v2]);
            assert!(crate::types::cross(a, b, c) > 0.0);
        }
    }

    #[test]
    fn union_covers_convex_hull() {
        let points = scatter(60, 42);
        let tri = Triangulation::find_delaunay_triangulation(&points);
        let hull = Shape::new(points.clone()).convex_hull();
        let hull_area = polygon_area(&hull);
        assert!((total_area(&points, &tri) - hull_area).abs() / hull_area < 1e-3);
    }

    #[test]
    fn circumcircles_are_empty() {
        let points = scatter(50, 3);
        let tri = Triangulation::find_delaunay_triangulation(&points);
        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();

        for t in tri.triangles() {
            let (cx, cy, r2) = circumcircle(coords[t.v0], coords[t.v1], coords[t.v2]);
            for (i, &(x, y)) in coords.iter().enumerate() {
                if t.indices().contains(&i) {
                    continue;
                }
                let d2 = (x - cx).powi(2) + (y - cy).powi(2);
                assert!(d2 >= r2 * (1.0 - 1e-9), "point {i} inside circumcircle of {t:?}");
            }
        }
    }

    #[test]
    fn collinear_points_have_no_area() {
        let points = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        let tri = Triangulation::find_delaunay_triangulation(&points);
        assert!(total_area(&points, &tri) < 1e-6);
    }

    #[test]
    fn duplicates_and_short_inputs() {
        let points = pts(&[(0.0, 0.0), (10.0, 0.0), (0.0, 0.0), (0.0, 10.0)]);
        let tri = Triangulation::find_delaunay_triangulation(&points);
        assert_eq!(tri.triangles().len(), 1);
        assert!(!tri.triangles()[0].indices().contains(&2));
        assert_eq!(tri.num_points(), 4);

        let two = pts(&[(0.0, 0.0), (1.0, 0.0)]);
        assert!(Triangulation::find_delaunay_triangulation(&two).is_empty());
    }
}
