//! Error types for the onnxpress library.
//!
//! Only pre-run validation and finalization conditions are errors here.
//! Per-stage failures (missing engine, engine execution error, missing
//! calibration data) never surface as `PressError` — they are contained at
//! the stage boundary and reported as `StageOutcome::Skipped`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for onnxpress operations.
#[derive(Debug, Error)]
pub enum PressError {
    /// The input model file does not exist. The run never starts.
    #[error("Input model not found: {0}")]
    MissingInputFile(PathBuf),

    /// No optimization stage was requested. The run never starts.
    #[error("No optimization selected. Enable at least one of --simplify, --fp16, --quantize, --optimize, or use --all")]
    NoStageSelected,

    /// Copying the final artifact to the output path failed.
    #[error("Failed to write output {path:?}: {message}")]
    Finalize {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Engine environment setup (venv creation, pip install) failed.
    #[error("Engine environment setup failed: {message}")]
    EnvSetup { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for onnxpress operations.
pub type Result<T> = std::result::Result<T, PressError>;

impl From<std::io::Error> for PressError {
    fn from(err: std::io::Error) -> Self {
        PressError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl PressError {
    /// Create an IO error with a short context message and path.
    pub fn io(context: &str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        PressError::Io {
            message: format!("{context}: {err}"),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a finalization error with path context.
    pub fn finalize(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        PressError::Finalize {
            message: err.to_string(),
            path: path.into(),
            source: Some(err),
        }
    }

    /// True for the usage errors that mean the run never started.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            PressError::MissingInputFile(_) | PressError::NoStageSelected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PressError::MissingInputFile(PathBuf::from("model.onnx"));
        assert_eq!(err.to_string(), "Input model not found: model.onnx");
    }

    #[test]
    fn test_usage_errors() {
        assert!(PressError::NoStageSelected.is_usage_error());
        assert!(PressError::MissingInputFile(PathBuf::from("x")).is_usage_error());
        assert!(!PressError::EnvSetup {
            message: "pip failed".into()
        }
        .is_usage_error());
    }

    #[test]
    fn test_io_helper_carries_path() {
        let err = PressError::io(
            "reading model",
            "/models/a.onnx",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        match err {
            PressError::Io { path, .. } => {
                assert_eq!(path, Some(PathBuf::from("/models/a.onnx")));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
