//! The averaging run: collect landmarks, build the mean layout, warp every
//! face onto it and keep a running average.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use image::Rgb32FImage;
use rayon::prelude::*;

use crate::accumulator::Accumulator;
use crate::align::resize_align;
use crate::blend::{blur_mask, face_mask};
use crate::config::AveragerConfig;
use crate::detector::LandmarkDetector;
use crate::error::{Error, Result};
use crate::image_io::{file_name, load_rgb, save_rgb, save_rgba};
use crate::mean_shape::{average_points, validate_batch};
use crate::provider::{CachedProvider, DetectingProvider, LandmarkProvider, Provenance};
use crate::store::LandmarkStore;
use crate::types::{Frame, Shape};
use crate::warp::Warper;

/// Images warped together per rayon batch.
pub(crate) const WARP_CHUNK: usize = 8;

/// Why an input image did not make it into the composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file could not be decoded.
    Unreadable(String),
    /// No provider had landmarks, or detection found no face.
    NoLandmarks,
    /// The detector failed on this image.
    DetectorFailed(String),
    /// The landmarks could not be fitted into the frame.
    AlignmentFailed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(e) => write!(f, "unreadable ({})", e),
            SkipReason::NoLandmarks => write!(f, "no face found"),
            SkipReason::DetectorFailed(e) => write!(f, "detector failed ({})", e),
            SkipReason::AlignmentFailed => write!(f, "alignment failed"),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct Composite {
    /// The averaged face, divided by the number of faces used.
    pub image: Rgb32FImage,
    /// The layout every face was warped onto.
    pub mean_layout: Shape,
    /// File names that went into the average, in accumulation order.
    pub used: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Receives the running average as a run progresses.
pub trait CompositeSink {
    /// Average of the first `step + 1` faces.
    fn intermediate(&mut self, _step: usize, _average: &Rgb32FImage) -> Result<()> {
        Ok(())
    }

    fn finished(&mut self, composite: &Composite) -> Result<()>;
}

/// Writes `{step:05}.jpg` per step and `result.jpg` (or `result.png` with
/// transparency) into a folder.
#[derive(Debug, Clone)]
pub struct FolderSink {
    dir: PathBuf,
    alpha: bool,
    blur_edges: bool,
}

impl FolderSink {
    pub fn new<P: Into<PathBuf>>(dir: P, config: &AveragerConfig) -> Self {
        Self {
            dir: dir.into(),
            alpha: config.alpha,
            blur_edges: config.blur_edges,
        }
    }

    pub fn result_path(&self) -> PathBuf {
        self.dir.join(if self.alpha { "result.png" } else { "result.jpg" })
    }
}

impl CompositeSink for FolderSink {
    fn intermediate(&mut self, step: usize, average: &Rgb32FImage) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        save_rgb(&self.dir.join(format!("{:05}.jpg", step)), average)
    }

    fn finished(&mut self, composite: &Composite) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.result_path();
        if self.alpha {
            let (width, height) = composite.image.dimensions();
            let mut mask = face_mask(Frame::new(width, height)?, &composite.mean_layout);
            if self.blur_edges {
                mask = blur_mask(&mask);
            }
            save_rgba(&path, &composite.image, &mask)?;
        } else {
            save_rgb(&path, &composite.image)?;
        }
        log::info!("Result written to: {}", path.display());
        Ok(())
    }
}

/// How [`Averager::ingest`] treats a file that already has stored landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Fail with [`Error::DuplicateEntry`].
    #[default]
    Insert,
    /// Overwrite the stored landmarks.
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The aligned face was written here.
    Stored(PathBuf),
    NoFace,
}

/// A face ready for warping: aligned image and landmarks in the frame.
struct Face {
    name: String,
    image: Rgb32FImage,
    points: Shape,
}

/// Drives averaging runs and single-capture ingest.
///
/// Landmarks come from the store when one is attached, otherwise (or on a
/// cache miss) from the detector. Detected landmarks are written back to the
/// store.
pub struct Averager<'a> {
    config: AveragerConfig,
    store: Option<&'a LandmarkStore>,
    detector: Option<&'a dyn LandmarkDetector>,
}

impl<'a> Averager<'a> {
    pub fn new(config: AveragerConfig) -> Self {
        Self {
            config,
            store: None,
            detector: None,
        }
    }

    pub fn with_store(mut self, store: &'a LandmarkStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_detector(mut self, detector: &'a dyn LandmarkDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn config(&self) -> &AveragerConfig {
        &self.config
    }

    fn providers(&self) -> Vec<Box<dyn LandmarkProvider + 'a>> {
        let mut providers: Vec<Box<dyn LandmarkProvider + 'a>> = Vec::new();
        if let Some(store) = self.store {
            providers.push(Box::new(CachedProvider::new(store)));
        }
        if let Some(detector) = self.detector {
            providers.push(Box::new(DetectingProvider::new(detector)));
        }
        providers
    }

    /// Average the faces in `paths` and hand progress and result to `sink`.
    ///
    /// Unreadable images and images without a face are skipped. Fails when
    /// no face is left, when landmark counts disagree, or when the mean
    /// layout cannot be triangulated; nothing is passed to
    /// [`CompositeSink::finished`] in that case.
    pub fn run(&self, paths: &[PathBuf], sink: &mut dyn CompositeSink) -> Result<Composite> {
        let frame = self.config.frame()?;
        log::info!(
            "Averaging {} images into {}x{}",
            paths.len(),
            frame.width,
            frame.height
        );

        let (mut faces, skipped) = self.collect(paths, frame)?;
        faces.sort_by(|a, b| b.name.cmp(&a.name));
        log::info!("Collected {} faces, skipped {}", faces.len(), skipped.len());

        validate_batch(faces.iter().map(|f| (f.name.as_str(), &f.points)))?;
        let shapes: Vec<Shape> = faces.iter().map(|f| f.points.clone()).collect();
        let mean_layout = average_points(&shapes)?;
        let warper = Warper::new(&mean_layout, frame, self.config.interpolation)?;
        log::info!(
            "Mean layout: {} landmarks, {} triangles",
            mean_layout.num_landmarks(),
            warper.triangles().len()
        );

        let mut accumulator = Accumulator::new(frame);
        for chunk in faces.chunks(WARP_CHUNK) {
            let warped: Vec<Rgb32FImage> = if self.config.parallel {
                chunk
                    .par_iter()
                    .map(|face| warper.warp(&face.image, &face.points))
                    .collect::<Result<_>>()?
            } else {
                chunk
                    .iter()
                    .map(|face| warper.warp(&face.image, &face.points))
                    .collect::<Result<_>>()?
            };

            for image in &warped {
                accumulator.add(image)?;
                if self.config.write_intermediates {
                    sink.intermediate(accumulator.count() - 1, &accumulator.average()?)?;
                }
            }
        }

        let composite = Composite {
            image: accumulator.average()?,
            mean_layout,
            used: faces.into_iter().map(|f| f.name).collect(),
            skipped,
        };
        sink.finished(&composite)?;
        log::info!("Averaged {} faces", composite.used.len());
        Ok(composite)
    }

    /// Load, look up and align every image. Per-image problems become skips;
    /// store failures abort.
    fn collect(&self, paths: &[PathBuf], frame: Frame) -> Result<(Vec<Face>, Vec<(String, SkipReason)>)> {
        let providers = self.providers();
        let mut faces = Vec::with_capacity(paths.len());
        let mut skipped = Vec::new();

        for path in paths {
            let name = file_name(path);
            let image = match load_rgb(path) {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("Skipping {}: {}", name, e);
                    skipped.push((name, SkipReason::Unreadable(e.to_string())));
                    continue;
                }
            };

            let points = match find_landmarks(&providers, path, &image)? {
                Lookup::Found(points, Provenance::Detected) => {
                    if let Some(store) = self.store {
                        store.put(&name, &points)?;
                    }
                    points
                }
                Lookup::Found(points, Provenance::Cached) => points,
                Lookup::Missing => {
                    log::warn!("Skipping {}: no face found", name);
                    skipped.push((name, SkipReason::NoLandmarks));
                    continue;
                }
                Lookup::Failed(e) => {
                    log::warn!("Skipping {}: detector failed: {}", name, e);
                    skipped.push((name, SkipReason::DetectorFailed(e)));
                    continue;
                }
            };

            match resize_align(&image, &points, frame) {
                Some((image, points)) => faces.push(Face { name, image, points }),
                None => {
                    log::warn!("Skipping {}: landmarks do not fit the frame", name);
                    skipped.push((name, SkipReason::AlignmentFailed));
                }
            }
        }

        Ok((faces, skipped))
    }

    /// Detect, align and mask one new capture, write it into `aligned_dir`
    /// under the same file name, and store its aligned landmarks.
    pub fn ingest(&self, capture: &Path, aligned_dir: &Path, mode: IngestMode) -> Result<IngestOutcome> {
        let detector = self
            .detector
            .ok_or_else(|| Error::Detector("no landmark detector configured".into()))?;
        let frame = self.config.frame()?;
        let name = file_name(capture);

        if let (Some(store), IngestMode::Insert) = (self.store, mode) {
            if store.contains(&name)? {
                return Err(Error::DuplicateEntry(name));
            }
        }

        let image = load_rgb(capture)?;
        let points = detector.detect(capture, &image)?;
        let Some((aligned, aligned_points)) = resize_align(&image, &points, frame) else {
            log::warn!("No face found in {}", name);
            return Ok(IngestOutcome::NoFace);
        };

        // Warping onto its own landmarks keeps only the face hull
        let masked = Warper::new(&aligned_points, frame, self.config.interpolation)?
            .warp(&aligned, &aligned_points)?;

        fs::create_dir_all(aligned_dir)?;
        let out = aligned_dir.join(&name);
        save_rgb(&out, &masked)?;

        if let Some(store) = self.store {
            match mode {
                IngestMode::Insert => store.put(&name, &aligned_points)?,
                IngestMode::Refresh => store.replace(&name, &aligned_points)?,
            }
        }
        log::info!("Ingested {} into {}", name, out.display());
        Ok(IngestOutcome::Stored(out))
    }
}

enum Lookup {
    Found(Shape, Provenance),
    Missing,
    /// Detector error; skips the image.
    Failed(String),
}

/// Ask each provider in turn. Store errors propagate.
fn find_landmarks(
    providers: &[Box<dyn LandmarkProvider + '_>],
    path: &Path,
    image: &Rgb32FImage,
) -> Result<Lookup> {
    for provider in providers {
        match provider.landmarks(path, image) {
            Ok(Some(points)) => return Ok(Lookup::Found(points, provider.provenance())),
            Ok(None) => {}
            Err(e) if provider.provenance() == Provenance::Detected => {
                return Ok(Lookup::Failed(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Lookup::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn skip_reasons_read_well() {
        assert_eq!(SkipReason::NoLandmarks.to_string(), "no face found");
        assert_eq!(
            SkipReason::DetectorFailed("exit 2".into()).to_string(),
            "detector failed (exit 2)"
        );
    }

    #[test]
    fn folder_sink_names_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FolderSink::new(dir.path(), &AveragerConfig::default());
        assert_eq!(sink.result_path(), dir.path().join("result.jpg"));

        let image = Rgb32FImage::from_pixel(40, 40, image::Rgb([200.0, 100.0, 50.0]));
        sink.intermediate(3, &image).unwrap();
        assert!(dir.path().join("00003.jpg").is_file());

        let composite = Composite {
            image,
            mean_layout: Shape::default(),
            used: vec!["a.jpg".into()],
            skipped: Vec::new(),
        };
        sink.finished(&composite).unwrap();
        assert!(dir.path().join("result.jpg").is_file());
    }

    #[test]
    fn folder_sink_alpha_writes_transparent_png() {
        let dir = tempfile::tempdir().unwrap();
        let config = AveragerConfig {
            alpha: true,
            ..AveragerConfig::default()
        };
        let mut sink = FolderSink::new(dir.path(), &config);
        let layout = Shape::new(vec![
            Point::new(5.0, 5.0),
            Point::new(35.0, 5.0),
            Point::new(35.0, 35.0),
            Point::new(5.0, 35.0),
        ]);
        let composite = Composite {
            image: Rgb32FImage::from_pixel(40, 40, image::Rgb([255.0, 255.0, 255.0])),
            mean_layout: layout,
            used: vec!["a.png".into()],
            skipped: Vec::new(),
        };
        sink.finished(&composite).unwrap();

        let written = image::open(dir.path().join("result.png")).unwrap().to_rgba8();
        assert_eq!(written.get_pixel(20, 20).0[3], 255);
        assert_eq!(written.get_pixel(1, 1).0[3], 0);
    }

    #[test]
    fn ingest_needs_a_detector() {
        let dir = tempfile::tempdir().unwrap();
        let err = Averager::new(AveragerConfig::default())
            .ingest(&dir.path().join("1.jpg"), dir.path(), IngestMode::Insert)
            .unwrap_err();
        assert!(matches!(err, Error::Detector(_)));
    }
}
