//! Piecewise-affine warping between two landmark layouts.
//!
//! The destination layout is triangulated once; every source image is then
//! pulled into the destination frame triangle by triangle, each triangle with
//! its own affine map from destination to source coordinates.

use image::{ImageBuffer, Rgb, Rgb32FImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::triangulation::{Triangle, Triangulation};
use crate::types::{cross, polygon_area, Frame, Point, Shape};

/// Destination triangles smaller than this (square pixels) are skipped.
pub const MIN_TRIANGLE_AREA: f32 = 1e-6;

/// Slack for pixels that sit exactly on a triangle edge.
const EDGE_EPSILON: f64 = 1e-6;

/// How source pixels are sampled at non-integer positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Bilinear,
    Nearest,
}

/// 2x3 affine transform, row-major: `[a, b, c, d, e, f]` maps (x, y) to
/// (a*x + b*y + c, d*x + e*y + f).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    m: [f64; 6],
}

impl Affine {
    /// The affine map taking triangle `from` onto triangle `to`, vertex by
    /// vertex. `None` when `from` is degenerate.
    pub fn from_triangles(from: [Point; 3], to: [Point; 3]) -> Option<Self> {
        let (ux, uy) = ((from[1].x - from[0].x) as f64, (from[1].y - from[0].y) as f64);
        let (vx, vy) = ((from[2].x - from[0].x) as f64, (from[2].y - from[0].y) as f64);
        let det = ux * vy - uy * vx;
        if det.abs() < 1e-12 {
            return None;
        }

        let (sux, suy) = ((to[1].x - to[0].x) as f64, (to[1].y - to[0].y) as f64);
        let (svx, svy) = ((to[2].x - to[0].x) as f64, (to[2].y - to[0].y) as f64);

        let a = (vy * sux - uy * svx) / det;
        let b = (ux * svx - vx * sux) / det;
        let d = (vy * suy - uy * svy) / det;
        let e = (ux * svy - vx * suy) / det;
        let (fx, fy) = (from[0].x as f64, from[0].y as f64);
        let c = to[0].x as f64 - a * fx - b * fy;
        let f = to[0].y as f64 - d * fx - e * fy;

        Some(Self { m: [a, b, c, d, e, f] })
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.m;
        (m[0] * x + m[1] * y + m[2], m[3] * x + m[4] * y + m[5])
    }
}

/// Warps source images onto one fixed destination layout.
///
/// Built once per mean layout; [`Warper::warp`] can then be called for every
/// image in the batch, from several threads if needed.
#[derive(Debug, Clone)]
pub struct Warper {
    target: Shape,
    triangles: Vec<Triangle>,
    frame: Frame,
    interpolation: Interpolation,
}

impl Warper {
    /// Triangulate `target` and prepare to warp into `frame`.
    pub fn new(target: &Shape, frame: Frame, interpolation: Interpolation) -> Result<Self> {
        let triangulation = Triangulation::find_delaunay_triangulation(&target.points);
        Self::with_triangles(target, triangulation.triangles().to_vec(), frame, interpolation)
    }

    /// Use an existing triangulation of `target`. Near-zero-area triangles
    /// are dropped; a layout left with none is an error.
    pub fn with_triangles(
        target: &Shape,
        triangles: Vec<Triangle>,
        frame: Frame,
        interpolation: Interpolation,
    ) -> Result<Self> {
        let n = target.num_landmarks();
        let total = triangles.len();
        let triangles: Vec<Triangle> = triangles
            .into_iter()
            .filter(|t| t.indices().iter().all(|&i| i < n))
            .filter(|t| {
                let area = polygon_area(&corners(target, t));
                if area < MIN_TRIANGLE_AREA {
                    log::debug!("Skipping degenerate triangle {:?} (area {:e})", t.indices(), area);
                    false
                } else {
                    true
                }
            })
            .collect();

        if triangles.is_empty() {
            return Err(Error::DegenerateLayout { points: n });
        }
        log::debug!(
            "Warp layout: {} landmarks, {} of {} triangles usable",
            n,
            triangles.len(),
            total
        );

        Ok(Self {
            target: target.clone(),
            triangles,
            frame,
            interpolation,
        })
    }

    pub fn target(&self) -> &Shape {
        &self.target
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Pull `source` into the target layout. Pixels outside every target
    /// triangle stay zero.
    pub fn warp(&self, source: &Rgb32FImage, source_points: &Shape) -> Result<Rgb32FImage> {
        if source_points.num_landmarks() != self.target.num_landmarks() {
            return Err(Error::LandmarkCountMismatch {
                name: "source landmarks".into(),
                expected: self.target.num_landmarks(),
                found: source_points.num_landmarks(),
            });
        }

        let (width, height) = self.frame.dimensions();
        let mut output: Rgb32FImage = ImageBuffer::new(width, height);
        let mut written = vec![false; width as usize * height as usize];

        for tri in &self.triangles {
            let dst = corners(&self.target, tri);
            let src = corners(source_points, tri);
            let Some(affine) = Affine::from_triangles(dst, src) else {
                continue;
            };
            let dst = if cross(dst[0], dst[1], dst[2]) < 0.0 {
                [dst[0], dst[2], dst[1]]
            } else {
                dst
            };

            let min_x = dst.iter().map(|p| p.x).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
            let min_y = dst.iter().map(|p| p.y).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
            let max_x = dst.iter().map(|p| p.x).fold(f32::MIN, f32::max).ceil();
            let max_y = dst.iter().map(|p| p.y).fold(f32::MIN, f32::max).ceil();
            if max_x < 0.0 || max_y < 0.0 {
                continue;
            }
            let max_x = (max_x as u32).min(width - 1);
            let max_y = (max_y as u32).min(height - 1);

            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    let idx = y as usize * width as usize + x as usize;
                    if written[idx] || !contains(&dst, x as f64, y as f64) {
                        continue;
                    }
                    let (sx, sy) = affine.apply(x as f64, y as f64);
                    let value = match self.interpolation {
                        Interpolation::Bilinear => sample_bilinear(source, sx as f32, sy as f32),
                        Interpolation::Nearest => sample_nearest(source, sx as f32, sy as f32),
                    };
                    output.put_pixel(x, y, Rgb(value));
                    written[idx] = true;
                }
            }
        }

        Ok(output)
    }
}

/// Warp `source` from `source_points` onto `target_points` in `frame`.
pub fn warp_image(
    source: &Rgb32FImage,
    source_points: &Shape,
    target_points: &Shape,
    frame: Frame,
) -> Result<Rgb32FImage> {
    Warper::new(target_points, frame, Interpolation::Bilinear)?.warp(source, source_points)
}

fn corners(shape: &Shape, tri: &Triangle) -> [Point; 3] {
    [shape[tri.v0], shape[tri.v1], shape[tri.v2]]
}

/// Inclusive point-in-triangle test for a counter-clockwise triangle.
fn contains(tri: &[Point; 3], x: f64, y: f64) -> bool {
    let edge = |a: Point, b: Point| {
        (b.x as f64 - a.x as f64) * (y - a.y as f64) - (b.y as f64 - a.y as f64) * (x - a.x as f64)
    };
    edge(tri[0], tri[1]) >= -EDGE_EPSILON
        && edge(tri[1], tri[2]) >= -EDGE_EPSILON
        && edge(tri[2], tri[0]) >= -EDGE_EPSILON
}

/// Sample a pixel with bilinear interpolation; positions are clamped to the image.
#[inline]
pub(crate) fn sample_bilinear(image: &Rgb32FImage, x: f32, y: f32) -> [f32; 3] {
    let max_x = (image.width() - 1) as f32;
    let max_y = (image.height() - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = image.get_pixel(x0, y0).0;
    let p10 = image.get_pixel(x1, y0).0;
    let p01 = image.get_pixel(x0, y1).0;
    let p11 = image.get_pixel(x1, y1).0;

    let mut out = [0.0; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

#[inline]
fn sample_nearest(image: &Rgb32FImage, x: f32, y: f32) -> [f32; 3] {
    let x = x.round().clamp(0.0, (image.width() - 1) as f32) as u32;
    let y = y.round().clamp(0.0, (image.height() - 1) as f32) as u32;
    image.get_pixel(x, y).0
}
