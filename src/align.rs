//! Geometric normalization of a face into the canonical frame.
//!
//! The landmarks' bounding box is scaled so that its dominant side fills
//! [`FACE_FILL`] of the frame, then a frame-sized window is cut around the
//! scaled box center. Image and points go through the same scale and offset,
//! so they stay in correspondence.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb, Rgb32FImage};

use crate::types::{Bounds, Frame, Point, Shape};
use crate::warp::sample_bilinear;

/// Share of the frame covered by the landmarks' bounding box.
pub const FACE_FILL: f32 = 0.8;

/// Scales this close to 1 are treated as exactly 1 (no resampling).
const SCALE_EPSILON: f32 = 1e-6;

/// Resize and crop `image` and its landmarks into `frame`.
///
/// Returns `None` when `points` is empty (no face was detected) or when the
/// landmarks do not yield a usable scale.
pub fn resize_align(image: &Rgb32FImage, points: &Shape, frame: Frame) -> Option<(Rgb32FImage, Shape)> {
    let bounds = points.bounds()?;
    let scale = scaling_factor(&bounds, frame);
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }
    let unit = (scale - 1.0).abs() < SCALE_EPSILON;
    let scale = if unit { 1.0 } else { scale };

    // Frame's top-left corner in scaled coordinates; halves round up so a
    // centered box maps onto itself
    let center = bounds.center() * scale;
    let origin = Point::new(
        (center.x - frame.width as f32 / 2.0 + 0.5).floor(),
        (center.y - frame.height as f32 / 2.0 + 0.5).floor(),
    );
    if !origin.x.is_finite() || !origin.y.is_finite() {
        return None;
    }

    let aligned = if unit {
        crop(image, origin, frame)
    } else if scale < 1.0 {
        let w = ((image.width() as f32 * scale).round() as u32).max(1);
        let h = ((image.height() as f32 * scale).round() as u32).max(1);
        crop(&downscale(image, w, h), origin, frame)
    } else {
        upscale_window(image, scale, origin, frame)
    };

    Some((aligned, points.scaled_shifted(scale, origin)))
}

/// Triangle-filtered resize. `imageops` clamps float samples to 0..=1, so
/// the 0..=255 samples are normalized around the call.
fn downscale(image: &Rgb32FImage, width: u32, height: u32) -> Rgb32FImage {
    let mut unit = image.clone();
    unit.pixels_mut().for_each(|p| p.0.iter_mut().for_each(|c| *c /= 255.0));
    let mut resized = imageops::resize(&unit, width, height, FilterType::Triangle);
    resized.pixels_mut().for_each(|p| p.0.iter_mut().for_each(|c| *c *= 255.0));
    resized
}

/// Frame-sized window of `image` starting at `origin`; zero outside.
fn crop(image: &Rgb32FImage, origin: Point, frame: Frame) -> Rgb32FImage {
    let (ox, oy) = (origin.x as i64, origin.y as i64);
    let (w, h) = (image.width() as i64, image.height() as i64);
    ImageBuffer::from_fn(frame.width, frame.height, |x, y| {
        let sx = x as i64 + ox;
        let sy = y as i64 + oy;
        if sx >= 0 && sy >= 0 && sx < w && sy < h {
            *image.get_pixel(sx as u32, sy as u32)
        } else {
            Rgb([0.0; 3])
        }
    })
}

/// The frame-sized window of `image` enlarged by `scale`, sampled
/// bilinearly. Only the window is ever materialized.
fn upscale_window(image: &Rgb32FImage, scale: f32, origin: Point, frame: Frame) -> Rgb32FImage {
    let s = scale as f64;
    let scaled_w = (image.width() as f64 * s).round();
    let scaled_h = (image.height() as f64 * s).round();
    let (ox, oy) = (origin.x as f64, origin.y as f64);
    ImageBuffer::from_fn(frame.width, frame.height, |x, y| {
        let gx = x as f64 + ox;
        let gy = y as f64 + oy;
        if gx < 0.0 || gy < 0.0 || gx >= scaled_w || gy >= scaled_h {
            return Rgb([0.0; 3]);
        }
        let sx = (gx + 0.5) / s - 0.5;
        let sy = (gy + 0.5) / s - 0.5;
        Rgb(sample_bilinear(image, sx as f32, sy as f32))
    })
}

fn scaling_factor(bounds: &Bounds, frame: Frame) -> f32 {
    let (fw, fh) = (frame.width as f32, frame.height as f32);
    let width_ratio = bounds.width / fw;
    let height_ratio = bounds.height / fh;

    if width_ratio <= 0.0 && height_ratio <= 0.0 {
        return 1.0;
    }
    if height_ratio > width_ratio {
        FACE_FILL * fh / bounds.height
    } else {
        FACE_FILL * fw / bounds.width
    }
}
