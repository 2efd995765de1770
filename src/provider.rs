use std::path::Path;

use image::Rgb32FImage;

use crate::detector::LandmarkDetector;
use crate::error::Result;
use crate::image_io::file_name;
use crate::store::LandmarkStore;
use crate::types::Shape;

/// Where a landmark set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Read back from the landmark store.
    Cached,
    /// Freshly computed by a detector.
    Detected,
}

/// One way of obtaining landmarks for an image.
///
/// `Ok(None)` means this provider has nothing for the image and the next
/// one should be asked.
pub trait LandmarkProvider {
    fn provenance(&self) -> Provenance;
    fn landmarks(&self, path: &Path, image: &Rgb32FImage) -> Result<Option<Shape>>;
}

/// Looks landmarks up in a store by file name.
pub struct CachedProvider<'a> {
    store: &'a LandmarkStore,
}

impl<'a> CachedProvider<'a> {
    pub fn new(store: &'a LandmarkStore) -> Self {
        Self { store }
    }
}

impl LandmarkProvider for CachedProvider<'_> {
    fn provenance(&self) -> Provenance {
        Provenance::Cached
    }

    fn landmarks(&self, path: &Path, _image: &Rgb32FImage) -> Result<Option<Shape>> {
        let name = file_name(path);
        let shape = self.store.get(&name)?;
        if shape.is_some() {
            log::debug!("Cache hit for {}", name);
        }
        Ok(shape)
    }
}

/// Runs a detector; an empty detection counts as "nothing".
pub struct DetectingProvider<'a> {
    detector: &'a dyn LandmarkDetector,
}

impl<'a> DetectingProvider<'a> {
    pub fn new(detector: &'a dyn LandmarkDetector) -> Self {
        Self { detector }
    }
}

impl LandmarkProvider for DetectingProvider<'_> {
    fn provenance(&self) -> Provenance {
        Provenance::Detected
    }

    fn landmarks(&self, path: &Path, image: &Rgb32FImage) -> Result<Option<Shape>> {
        let shape = self.detector.detect(path, image)?;
        Ok(if shape.is_empty() { None } else { Some(shape) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn cached_provider_keys_by_file_name() {
        let store = LandmarkStore::open_in_memory().unwrap();
        let shape = Shape::new(vec![Point::new(1.0, 2.0)]);
        store.put("face.jpg", &shape).unwrap();

        let provider = CachedProvider::new(&store);
        let image = Rgb32FImage::new(1, 1);
        assert_eq!(provider.provenance(), Provenance::Cached);
        assert_eq!(
            provider.landmarks(Path::new("/some/dir/face.jpg"), &image).unwrap(),
            Some(shape)
        );
        assert_eq!(provider.landmarks(Path::new("other.jpg"), &image).unwrap(), None);
    }

    #[test]
    fn empty_detection_is_nothing() {
        let detector = |_: &Path, _: &Rgb32FImage| -> Result<Shape> { Ok(Shape::default()) };
        let provider = DetectingProvider::new(&detector);
        assert_eq!(provider.provenance(), Provenance::Detected);
        assert_eq!(
            provider.landmarks(Path::new("a.jpg"), &Rgb32FImage::new(1, 1)).unwrap(),
            None
        );
    }
}
