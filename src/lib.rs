//! # mean-face
//!
//! Composite ("average") faces from a collection of photographs.
//!
//! This crate provides:
//! - **Landmark Store**: SQLite cache of landmark sets keyed by file name
//! - **Alignment**: scale and crop each face into a fixed canonical frame
//! - **Piecewise-Affine Warping**: Delaunay-triangulated warps onto a common layout
//! - **Running Average**: incremental pixel average with per-step output
//!
//! ## Pipeline Overview
//!
//! 1. Look up each image's landmarks in the store, or run the detector and
//!    store the result
//! 2. Align every image and its landmarks into the canonical frame
//! 3. Average all landmark sets into the mean layout
//! 4. Triangulate the mean layout once
//! 5. Warp each face onto it and add it to the running average
//! 6. Write the running average after every face and the final composite
//!
//! ## Quick Start
//!
//! ```no_run
//! use mean_face::{
//!     list_image_paths, Averager, AveragerConfig, CommandDetector, FolderSink, LandmarkStore,
//! };
//! use std::path::Path;
//!
//! # fn main() -> mean_face::Result<()> {
//! let store = LandmarkStore::open("points.sqlite")?;
//! let detector = CommandDetector::new("detect-landmarks");
//! let config = AveragerConfig::default();
//!
//! let paths = list_image_paths(Path::new("faces"))?;
//! let mut sink = FolderSink::new("result", &config);
//! let composite = Averager::new(config)
//!     .with_store(&store)
//!     .with_detector(&detector)
//!     .run(&paths, &mut sink)?;
//! println!("Averaged {} faces", composite.used.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Detectors
//!
//! Any closure with the right signature is a [`LandmarkDetector`]:
//!
//! ```rust
//! use mean_face::{LandmarkDetector, Point, Result, Shape};
//! use image::Rgb32FImage;
//! use std::path::Path;
//!
//! let detector = |_path: &Path, image: &Rgb32FImage| -> Result<Shape> {
//!     // Return an empty shape when there is no face
//!     let (w, h) = (image.width() as f32, image.height() as f32);
//!     Ok(Shape::new(vec![
//!         Point::new(w * 0.3, h * 0.4),
//!         Point::new(w * 0.7, h * 0.4),
//!         Point::new(w * 0.5, h * 0.8),
//!     ]))
//! };
//! let shape = detector.detect(Path::new("face.jpg"), &Rgb32FImage::new(100, 100)).unwrap();
//! assert_eq!(shape.num_landmarks(), 3);
//! ```

mod accumulator;
mod align;
mod blend;
mod config;
mod detector;
mod error;
mod image_io;
mod layout;
mod mean_shape;
mod pipeline;
mod provider;
mod store;
mod triangulation;
mod types;
mod warp;

pub use accumulator::Accumulator;
pub use align::{resize_align, FACE_FILL};
pub use blend::{blur_mask, face_mask};
pub use config::AveragerConfig;
pub use detector::{CommandDetector, LandmarkDetector};
pub use error::{Error, Result};
pub use image_io::{file_name, list_image_paths, load_rgb, save_rgb, save_rgba};
pub use layout::DataLayout;
pub use mean_shape::{average_points, validate_batch};
pub use pipeline::{
    Averager, Composite, CompositeSink, FolderSink, IngestMode, IngestOutcome, SkipReason,
};
pub use provider::{CachedProvider, DetectingProvider, LandmarkProvider, Provenance};
pub use store::LandmarkStore;
pub use triangulation::{Triangle, Triangulation};
pub use types::{Bounds, Frame, Point, Shape};
pub use warp::{warp_image, Affine, Interpolation, Warper, MIN_TRIANGLE_AREA};
