use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Frame;
use crate::warp::Interpolation;

/// Settings for one averaging run.
///
/// Stored as JSON; fields missing from a file take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AveragerConfig {
    /// Canonical frame width in pixels.
    pub width: u32,
    /// Canonical frame height in pixels.
    pub height: u32,
    /// Write the result as PNG with the face mask as transparency.
    pub alpha: bool,
    /// Feather the edge of the alpha mask.
    pub blur_edges: bool,
    /// Write the running average after every image.
    pub write_intermediates: bool,
    /// Warp images on the rayon pool.
    pub parallel: bool,
    pub interpolation: Interpolation,
}

impl Default for AveragerConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 600,
            alpha: false,
            blur_edges: false,
            write_intermediates: true,
            parallel: true,
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl AveragerConfig {
    pub fn frame(&self) -> Result<Frame> {
        Frame::new(self.width, self.height)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        log::info!("Settings loaded from: {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("Settings saved to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults() {
        let config = AveragerConfig::default();
        assert_eq!(config.frame().unwrap(), Frame::new(500, 600).unwrap());
        assert!(config.write_intermediates);
        assert!(!config.alpha && !config.blur_edges);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: AveragerConfig =
            serde_json::from_str(r#"{"width": 100, "interpolation": "nearest"}"#).unwrap();
        assert_eq!(config.width, 100);
        assert_eq!(config.height, 600);
        assert_eq!(config.interpolation, Interpolation::Nearest);
        assert!(config.parallel);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let config = AveragerConfig {
            alpha: true,
            blur_edges: true,
            parallel: false,
            ..AveragerConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(AveragerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn zero_sized_frame_is_invalid() {
        let config = AveragerConfig {
            width: 0,
            ..AveragerConfig::default()
        };
        assert!(matches!(config.frame(), Err(Error::InvalidSize { width: 0, height: 600 })));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ width: ").unwrap();
        assert!(matches!(AveragerConfig::load(&path), Err(Error::Json(_))));
    }
}
