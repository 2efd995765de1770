//! Landmark detection backends.
//!
//! Detection itself lives outside this crate. A detector only has to turn one
//! decoded image into a landmark set, or an empty set when it sees no face.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::Rgb32FImage;

use crate::error::{Error, Result};
use crate::types::{Point, Shape};

/// Finds facial landmarks in one image.
///
/// An empty [`Shape`] means "no face found". Errors are reserved for the
/// detector itself failing.
pub trait LandmarkDetector: Sync {
    fn detect(&self, path: &Path, image: &Rgb32FImage) -> Result<Shape>;
}

impl<F> LandmarkDetector for F
where
    F: Fn(&Path, &Rgb32FImage) -> Result<Shape> + Sync,
{
    fn detect(&self, path: &Path, image: &Rgb32FImage) -> Result<Shape> {
        self(path, image)
    }
}

/// Runs an external program per image: `<program> <args...> <image path>`.
///
/// The program prints a JSON array of `[x, y]` pairs on stdout, `[]` when
/// there is no face.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl LandmarkDetector for CommandDetector {
    fn detect(&self, path: &Path, _image: &Rgb32FImage) -> Result<Shape> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| {
                Error::Detector(format!("failed to run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            return Err(Error::Detector(format!(
                "{} exited with {} on {}: {}",
                self.program.display(),
                output.status,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_points(&output.stdout)
            .map_err(|e| Error::Detector(format!("bad output for {}: {}", path.display(), e)))
    }
}

/// Parse a JSON `[[x, y], ...]` landmark list.
fn parse_points(json: &[u8]) -> std::result::Result<Shape, serde_json::Error> {
    let pairs: Vec<[f32; 2]> = serde_json::from_slice(json)?;
    Ok(Shape::new(pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect()))
}
