//! Scratch space for intermediate stage artifacts.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PressError, Result};

/// A working directory beside the input model that holds intermediate
/// artifacts between stages. Removed recursively on drop, so every exit
/// path out of the pipeline releases it.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    pub const DIR_NAME: &'static str = ".onnxpress-work";

    /// Create (or reuse) the scratch directory next to `input`.
    pub fn create(input: &Path) -> Result<Self> {
        let parent = input.parent().unwrap_or_else(|| Path::new("."));
        let dir = parent.join(Self::DIR_NAME);
        std::fs::create_dir_all(&dir)
            .map_err(|e| PressError::io("creating scratch directory", &dir, e))?;
        debug!(dir = %dir.display(), "created scratch space");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for the artifact produced by the `n`th completed stage
    /// (1-based). Skipped stages never consume a step number, so a later
    /// stage reuses and overwrites the path of a failed attempt.
    pub fn step_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("step{n}.onnx"))
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "failed to remove scratch space");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_drop_removes_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("model.onnx");
        std::fs::write(&input, b"x").unwrap();

        let dir;
        {
            let scratch = ScratchSpace::create(&input).unwrap();
            dir = scratch.dir().to_path_buf();
            assert!(dir.exists());
            assert_eq!(dir.file_name().unwrap(), ScratchSpace::DIR_NAME);
            std::fs::write(scratch.step_path(1), b"intermediate").unwrap();
        }
        assert!(!dir.exists());
    }

    #[test]
    fn test_create_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("model.onnx");
        std::fs::write(&input, b"x").unwrap();

        let a = ScratchSpace::create(&input).unwrap();
        std::fs::write(a.step_path(1), b"left over").unwrap();
        std::mem::forget(a);

        // A second create over a dir with stale contents succeeds.
        let b = ScratchSpace::create(&input).unwrap();
        assert!(b.step_path(1).exists());
    }

    #[test]
    fn test_step_paths_are_numbered() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("model.onnx");
        std::fs::write(&input, b"x").unwrap();

        let scratch = ScratchSpace::create(&input).unwrap();
        assert_eq!(
            scratch.step_path(3).file_name().unwrap().to_str().unwrap(),
            "step3.onnx"
        );
    }
}
