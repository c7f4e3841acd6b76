//! Pipeline stages.
//!
//! Each stage takes the current head artifact and either produces a new
//! artifact at the requested output path or reports why it could not run.
//! Stage failures are never fatal to the pipeline; the head simply carries
//! past them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::types::StageOutcome;
use crate::artifact::ModelArtifact;
use crate::engine::{run_engine, EngineEnv, EngineError, EngineKind};
use crate::error::{PressError, Result};

/// A single optimization pass over the model.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable stage name used in logs and the size report.
    fn name(&self) -> &str;

    /// Apply the stage to `input`, writing the result to `output`.
    ///
    /// Returns `Skipped` for anything short of success — a missing engine,
    /// an engine failure, or an unsatisfied precondition. The stage must
    /// not leave a usable partial file claim behind: `Completed` is only
    /// returned when `output` holds a finished artifact.
    async fn apply(&self, input: &ModelArtifact, output: &Path) -> StageOutcome;
}

/// Supplies calibration batches for static quantization.
///
/// No reader ships with the crate; callers that have a representative
/// dataset implement this and pass it into the static quantize stage.
#[async_trait]
pub trait CalibrationReader: Send + Sync {
    /// Materialize calibration input under `scratch_dir`, returning the
    /// path the quantizer should read batches from.
    async fn prepare(&self, scratch_dir: &Path) -> Result<PathBuf>;
}

/// Calibration data already materialized on disk.
pub struct CalibrationDataset {
    path: PathBuf,
}

impl CalibrationDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CalibrationReader for CalibrationDataset {
    async fn prepare(&self, _scratch_dir: &Path) -> Result<PathBuf> {
        tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| PressError::io("reading calibration data", &self.path, e))?;
        Ok(self.path.clone())
    }
}

fn outcome_from_engine(
    stage: &str,
    result: std::result::Result<(), EngineError>,
    output: &Path,
) -> StageOutcome {
    match result {
        Ok(()) => match ModelArtifact::from_path(output) {
            Ok(artifact) => StageOutcome::Completed(artifact),
            Err(e) => StageOutcome::skipped(format!("{stage} output unreadable: {e}")),
        },
        Err(EngineError::Unavailable { reason }) => StageOutcome::skipped(reason),
        Err(EngineError::Failed { message }) => {
            StageOutcome::skipped(format!("{stage} failed: {message}"))
        }
    }
}

/// Simplifies the graph with onnxsim, folding constants and removing
/// redundant nodes.
pub struct SimplifyStage {
    env: EngineEnv,
}

impl SimplifyStage {
    pub fn new(env: EngineEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Stage for SimplifyStage {
    fn name(&self) -> &str {
        "simplify"
    }

    async fn apply(&self, input: &ModelArtifact, output: &Path) -> StageOutcome {
        debug!(input = %input.path.display(), "running simplify");
        let result = run_engine(&self.env, EngineKind::Simplifier, &input.path, output).await;
        outcome_from_engine(self.name(), result, output)
    }
}

/// Converts float32 weights to float16, keeping I/O tensor types intact.
pub struct Fp16Stage {
    env: EngineEnv,
}

impl Fp16Stage {
    pub fn new(env: EngineEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Stage for Fp16Stage {
    fn name(&self) -> &str {
        "fp16"
    }

    async fn apply(&self, input: &ModelArtifact, output: &Path) -> StageOutcome {
        debug!(input = %input.path.display(), "running fp16 conversion");
        let result = run_engine(&self.env, EngineKind::Fp16Converter, &input.path, output).await;
        outcome_from_engine(self.name(), result, output)
    }
}

/// Weight-only int8 quantization. No calibration data required.
pub struct DynamicQuantizeStage {
    env: EngineEnv,
}

impl DynamicQuantizeStage {
    pub fn new(env: EngineEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Stage for DynamicQuantizeStage {
    fn name(&self) -> &str {
        "dynamic-quantize"
    }

    async fn apply(&self, input: &ModelArtifact, output: &Path) -> StageOutcome {
        debug!(input = %input.path.display(), "running dynamic quantization");
        let result = run_engine(&self.env, EngineKind::Quantizer, &input.path, output).await;
        outcome_from_engine(self.name(), result, output)
    }
}

/// Full int8 quantization of weights and activations. Requires a
/// calibration reader; without one the stage always skips.
pub struct StaticQuantizeStage {
    reader: Option<Box<dyn CalibrationReader>>,
}

impl StaticQuantizeStage {
    pub fn new(reader: Option<Box<dyn CalibrationReader>>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Stage for StaticQuantizeStage {
    fn name(&self) -> &str {
        "static-quantize"
    }

    async fn apply(&self, _input: &ModelArtifact, _output: &Path) -> StageOutcome {
        match &self.reader {
            None => StageOutcome::skipped("static quantization requires calibration data"),
            // TODO: wire a calibration-backed quantize script once a
            // CalibrationReader implementation exists to exercise it.
            Some(_) => StageOutcome::skipped(
                "static quantization is not implemented; use --quantize dynamic",
            ),
        }
    }
}

/// Runs onnxruntime graph-level optimizations (fusion, layout) and saves
/// the optimized graph.
pub struct GraphOptimizeStage {
    env: EngineEnv,
}

impl GraphOptimizeStage {
    pub fn new(env: EngineEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Stage for GraphOptimizeStage {
    fn name(&self) -> &str {
        "graph-optimize"
    }

    async fn apply(&self, input: &ModelArtifact, output: &Path) -> StageOutcome {
        debug!(input = %input.path.display(), "running graph optimization");
        let result = run_engine(&self.env, EngineKind::GraphOptimizer, &input.path, output).await;
        outcome_from_engine(self.name(), result, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_quantize_skips_without_reader() {
        let tmp = tempfile::tempdir().unwrap();
        let input_path = tmp.path().join("m.onnx");
        std::fs::write(&input_path, b"model").unwrap();
        let input = ModelArtifact::from_path(&input_path).unwrap();

        let stage = StaticQuantizeStage::new(None);
        let outcome = stage.apply(&input, &tmp.path().join("out.onnx")).await;
        match outcome {
            StageOutcome::Skipped { reason } => {
                assert_eq!(reason, "static quantization requires calibration data")
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_static_quantize_with_dataset_reports_not_implemented() {
        let tmp = tempfile::tempdir().unwrap();
        let input_path = tmp.path().join("m.onnx");
        std::fs::write(&input_path, b"model").unwrap();
        let input = ModelArtifact::from_path(&input_path).unwrap();

        let reader = Box::new(CalibrationDataset::new(tmp.path()));
        let stage = StaticQuantizeStage::new(Some(reader));
        let outcome = stage.apply(&input, &tmp.path().join("out.onnx")).await;
        match outcome {
            StageOutcome::Skipped { reason } => {
                assert!(reason.contains("not implemented"), "{reason}");
                assert!(reason.contains("--quantize dynamic"), "{reason}");
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_calibration_dataset_requires_existing_path() {
        let tmp = tempfile::tempdir().unwrap();

        let missing = CalibrationDataset::new(tmp.path().join("absent"));
        assert!(missing.prepare(tmp.path()).await.is_err());

        let data_dir = tmp.path().join("calib");
        std::fs::create_dir(&data_dir).unwrap();
        let present = CalibrationDataset::new(&data_dir);
        assert_eq!(present.prepare(tmp.path()).await.unwrap(), data_dir);
    }

    #[test]
    fn test_engine_failure_maps_to_skip() {
        let outcome = outcome_from_engine(
            "fp16",
            Err(EngineError::Failed {
                message: "exit code 1".into(),
            }),
            Path::new("/nonexistent/out.onnx"),
        );
        match outcome {
            StageOutcome::Skipped { reason } => assert!(reason.contains("fp16 failed")),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn test_engine_unavailable_maps_to_skip_with_reason() {
        let outcome = outcome_from_engine(
            "simplify",
            Err(EngineError::Unavailable {
                reason: "Python package 'onnxsim' is not installed".into(),
            }),
            Path::new("/nonexistent/out.onnx"),
        );
        match outcome {
            StageOutcome::Skipped { reason } => assert!(reason.contains("onnxsim")),
            other => panic!("expected skip, got {other:?}"),
        }
    }
}
