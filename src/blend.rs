//! Face masks for transparent output.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::filter::box_filter;
use imageproc::morphology::erode;
use imageproc::point::Point as PixelPoint;

use crate::types::{Frame, Shape};

/// Radius of the square erosion and blur windows, in pixels.
const MASK_RADIUS: u8 = 5;

/// Opaque inside the landmarks' convex hull, pulled in by [`MASK_RADIUS`]
/// pixels so the warp's ragged border is cut away. Transparent elsewhere.
pub fn face_mask(frame: Frame, points: &Shape) -> GrayImage {
    let mut mask = GrayImage::new(frame.width, frame.height);

    let mut polygon: Vec<PixelPoint<i32>> = points
        .convex_hull()
        .iter()
        .map(|p| PixelPoint::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    polygon.dedup();
    // The polygon must not repeat its first vertex at the end
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() < 3 {
        return mask;
    }

    draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));
    erode(&mask, Norm::LInf, MASK_RADIUS)
}

/// Box blur over a `2 * MASK_RADIUS + 1` square window. Feathers mask edges.
pub fn blur_mask(mask: &GrayImage) -> GrayImage {
    box_filter(mask, MASK_RADIUS as u32, MASK_RADIUS as u32)
}
