//! Data folder used by the `mean-face` binary.
//!
//! ```text
//! <root>/captures/       raw camera captures, one per timestamp
//! <root>/aligned/        faces aligned into the canonical frame
//! <root>/result/         running averages and the final composite
//! <root>/archive/        overflow moved out of captures/ and aligned/
//! <root>/points.sqlite   landmark store
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::image_io::list_image_paths;

#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn captures(&self) -> PathBuf {
        self.root.join("captures")
    }

    pub fn aligned(&self) -> PathBuf {
        self.root.join("aligned")
    }

    pub fn result(&self) -> PathBuf {
        self.root.join("result")
    }

    pub fn archive(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn store(&self) -> PathBuf {
        self.root.join("points.sqlite")
    }

    /// Capture file for a timestamp.
    pub fn capture(&self, timestamp: &str) -> PathBuf {
        self.captures().join(format!("{}.jpg", timestamp))
    }

    /// Create every folder that does not exist yet.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [
            self.captures(),
            self.aligned(),
            self.result(),
            self.archive().join("captures"),
            self.archive().join("aligned"),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Delete the `.jpg` and `.png` files left in the result folder by the
    /// previous run. Returns how many were removed.
    pub fn clear_results(&self) -> Result<usize> {
        let dir = self.result();
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for path in list_image_paths(&dir)? {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase());
            if matches!(ext.as_deref(), Some("jpg") | Some("png")) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        log::debug!("Removed {} old result files", removed);
        Ok(removed)
    }

    /// Keep the newest `keep + 1` captures and the newest `keep` aligned
    /// faces; move the rest into `archive/`. The capture being ingested has
    /// no aligned face yet, hence the extra capture.
    pub fn archive_overflow(&self, keep: usize) -> Result<usize> {
        let moved = move_overflow(&self.captures(), &self.archive().join("captures"), keep + 1)?
            + move_overflow(&self.aligned(), &self.archive().join("aligned"), keep)?;
        if moved > 0 {
            log::info!("Archived {} files", moved);
        }
        Ok(moved)
    }
}

/// Move everything past the first `keep` entries (newest first by file
/// name) from `from` into `to`.
fn move_overflow(from: &Path, to: &Path, keep: usize) -> Result<usize> {
    if !from.is_dir() {
        return Ok(0);
    }
    let mut entries: Vec<PathBuf> = fs::read_dir(from)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.retain(|p| p.is_file());
    entries.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let overflow = entries.len().saturating_sub(keep);
    if overflow == 0 {
        return Ok(0);
    }
    fs::create_dir_all(to)?;
    for path in entries.into_iter().skip(keep) {
        if let Some(name) = path.file_name() {
            fs::rename(&path, to.join(name))?;
        }
    }
    Ok(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn paths_hang_off_root() {
        let layout = DataLayout::new("/data");
        assert_eq!(layout.capture("1700000000"), Path::new("/data/captures/1700000000.jpg"));
        assert_eq!(layout.store(), Path::new("/data/points.sqlite"));
        assert_eq!(layout.root(), Path::new("/data"));
    }

    #[test]
    fn clear_results_leaves_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        layout.create_dirs().unwrap();
        for name in ["00000.jpg", "00001.jpg", "result.png", "notes.txt"] {
            touch(&layout.result(), name);
        }
        assert_eq!(layout.clear_results().unwrap(), 3);
        assert_eq!(names(&layout.result()), vec!["notes.txt"]);
    }

    #[test]
    fn clear_results_without_folder() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(DataLayout::new(dir.path()).clear_results().unwrap(), 0);
    }

    #[test]
    fn archive_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        layout.create_dirs().unwrap();
        for ts in ["100", "101", "102", "103", "104"] {
            touch(&layout.captures(), &format!("{ts}.jpg"));
            touch(&layout.aligned(), &format!("{ts}.jpg"));
        }

        assert_eq!(layout.archive_overflow(2).unwrap(), 2 + 3);
        assert_eq!(names(&layout.captures()), vec!["102.jpg", "103.jpg", "104.jpg"]);
        assert_eq!(names(&layout.aligned()), vec!["103.jpg", "104.jpg"]);
        assert_eq!(names(&layout.archive().join("captures")), vec!["100.jpg", "101.jpg"]);
        assert_eq!(
            names(&layout.archive().join("aligned")),
            vec!["100.jpg", "101.jpg", "102.jpg"]
        );

        // Nothing left to move
        assert_eq!(layout.archive_overflow(2).unwrap(), 0);
    }
}
