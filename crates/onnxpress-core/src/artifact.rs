//! On-disk model artifact handle.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{PressError, Result};

/// A reference to a model blob on disk plus its byte size.
///
/// Immutable once produced: a pipeline stage that transforms the model
/// produces a new `ModelArtifact` pointing at a new file; the old one is
/// superseded, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl ModelArtifact {
    /// Snapshot the file at `path`. Fails if it does not exist.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path)
            .map_err(|e| PressError::io("reading model metadata", &path, e))?;
        Ok(Self {
            size_bytes: meta.len(),
            path,
        })
    }
}

/// Format bytes as a human-readable string.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_missing_file() {
        let result = ModelArtifact::from_path("/nonexistent/model.onnx");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_path_snapshots_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let artifact = ModelArtifact::from_path(&path).unwrap();
        assert_eq!(artifact.size_bytes, 4096);
        assert_eq!(artifact.path, path);
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512.00 B");
        assert_eq!(human_bytes(2048), "2.00 KB");
        assert_eq!(human_bytes(10 * 1024 * 1024), "10.00 MB");
    }

    #[test]
    fn test_equality_is_path_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"onnx").unwrap();

        let a = ModelArtifact::from_path(&path).unwrap();
        let b = ModelArtifact::from_path(&path).unwrap();
        assert_eq!(a, b);
    }
}
