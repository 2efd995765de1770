use std::path::{Path, PathBuf};

use image::{GrayImage, ImageBuffer, Rgb, Rgb32FImage, RgbImage, Rgba, RgbaImage};

use crate::error::Result;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Load an image from disk as a 3-channel float raster (0.0..=255.0 samples).
///
/// Any alpha channel is dropped.
pub fn load_rgb(path: &Path) -> Result<Rgb32FImage> {
    let start = std::time::Instant::now();
    let img = image::open(path)?.to_rgb8();
    log::debug!(
        "Loaded {} in {:?} - Size: {}x{}",
        path.display(),
        start.elapsed(),
        img.width(),
        img.height()
    );
    Ok(to_float(&img))
}

/// Widen 8-bit samples to `f32` without rescaling.
pub(crate) fn to_float(img: &RgbImage) -> Rgb32FImage {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y).0;
        Rgb([p[0] as f32, p[1] as f32, p[2] as f32])
    })
}

/// Narrow float samples to 8 bits: clamp to 0..=255, then truncate.
pub(crate) fn to_u8(img: &Rgb32FImage) -> RgbImage {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y).0;
        Rgb([quantize(p[0]), quantize(p[1]), quantize(p[2])])
    })
}

#[inline]
fn quantize(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// Write a float raster; the format follows the file extension.
pub fn save_rgb(path: &Path, img: &Rgb32FImage) -> Result<()> {
    to_u8(img).save(path)?;
    log::debug!("Saved {}", path.display());
    Ok(())
}

/// Write a float raster with `alpha` as its transparency channel.
pub fn save_rgba(path: &Path, img: &Rgb32FImage, alpha: &GrayImage) -> Result<()> {
    let rgb = to_u8(img);
    let rgba: RgbaImage = ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let p = rgb.get_pixel(x, y).0;
        let a = alpha.get_pixel(x, y).0[0];
        Rgba([p[0], p[1], p[2], a])
    });
    rgba.save(path)?;
    log::debug!("Saved {}", path.display());
    Ok(())
}

/// Image files (`.jpg`, `.jpeg`, `.png`, any case) in `dir`, filename descending.
pub fn list_image_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| file_name(b).cmp(&file_name(a)));
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .map_or(false, |ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// The key used for a file in the landmark store.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
