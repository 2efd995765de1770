use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Landmark encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Landmark store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Landmark detector failed: {0}")]
    Detector(String),

    #[error("Landmarks for {0:?} already stored; use replace to overwrite")]
    DuplicateEntry(String),

    #[error("Landmark count mismatch in {name:?}: expected {expected} points, found {found}")]
    LandmarkCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("No usable images after filtering")]
    NoUsableImages,

    #[error("Landmark layout of {points} points has no triangle with non-zero area")]
    DegenerateLayout { points: usize },

    #[error("Invalid canonical frame size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Image size mismatch: expected {expected:?}, found {found:?}")]
    SizeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_entry_names_the_file() {
        let err = Error::DuplicateEntry("1700000000.jpg".into());
        assert_eq!(
            err.to_string(),
            "Landmarks for \"1700000000.jpg\" already stored; use replace to overwrite"
        );
    }
}
