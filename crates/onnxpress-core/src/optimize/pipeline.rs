//! Pipeline runner.
//!
//! Threads a head artifact through the planned stages. A completed stage
//! replaces the head; a skipped stage leaves it alone. Only the two
//! precondition errors (missing input, nothing selected) and the final
//! copy can fail the run.
//!
//! Concurrent runs against the same input directory are unsupported: they
//! would share one scratch directory and race on its removal.

use std::path::Path;

use tracing::{info, warn};

use super::plan::{resolve_output_path, resolve_plan, PlannedStage};
use super::report::OptimizeReport;
use super::scratch::ScratchSpace;
use super::stage::{
    CalibrationDataset, CalibrationReader, DynamicQuantizeStage, Fp16Stage, GraphOptimizeStage,
    SimplifyStage, Stage, StaticQuantizeStage,
};
use super::types::{OptimizeRequest, StageOutcome};
use crate::artifact::ModelArtifact;
use crate::engine::EngineEnv;
use crate::error::{PressError, Result};

/// Run the pipeline with the default engine-backed stages.
pub async fn run(input: &Path, request: &OptimizeRequest, env: &EngineEnv) -> Result<OptimizeReport> {
    run_with(input, request, build_stages(request, env)).await
}

/// Instantiate the engine-backed stage for each planned entry. A
/// calibration data path on the request becomes a dataset-backed reader
/// for the static quantize stage.
fn build_stages(request: &OptimizeRequest, env: &EngineEnv) -> Vec<Box<dyn Stage>> {
    resolve_plan(request)
        .into_iter()
        .map(|planned| -> Box<dyn Stage> {
            match planned {
                PlannedStage::Simplify => Box::new(SimplifyStage::new(env.clone())),
                PlannedStage::Fp16 => Box::new(Fp16Stage::new(env.clone())),
                PlannedStage::DynamicQuantize => Box::new(DynamicQuantizeStage::new(env.clone())),
                PlannedStage::StaticQuantize => {
                    let reader = request.calibration_data.clone().map(|path| {
                        Box::new(CalibrationDataset::new(path)) as Box<dyn CalibrationReader>
                    });
                    Box::new(StaticQuantizeStage::new(reader))
                }
                PlannedStage::GraphOptimize => Box::new(GraphOptimizeStage::new(env.clone())),
            }
        })
        .collect()
}

/// Run the pipeline over an explicit stage list. The list must already be
/// in pipeline order; `run` derives it from the request.
pub async fn run_with(
    input: &Path,
    request: &OptimizeRequest,
    stages: Vec<Box<dyn Stage>>,
) -> Result<OptimizeReport> {
    if !input.is_file() {
        return Err(PressError::MissingInputFile(input.to_path_buf()));
    }
    if request.is_empty() {
        return Err(PressError::NoStageSelected);
    }

    let original = ModelArtifact::from_path(input)?;
    let output_path = resolve_output_path(input, request);
    info!(
        input = %input.display(),
        output = %output_path.display(),
        size = original.size_bytes,
        stages = stages.len(),
        "starting optimization"
    );

    // Dropped on every exit path below, which removes the directory.
    let scratch = ScratchSpace::create(input)?;

    let mut head = original.clone();
    let mut stage_sizes: Vec<(String, u64)> = Vec::new();

    for stage in &stages {
        let step = scratch.step_path(stage_sizes.len() + 1);
        match stage.apply(&head, &step).await {
            StageOutcome::Completed(artifact) => {
                info!(
                    stage = stage.name(),
                    size = artifact.size_bytes,
                    "stage completed"
                );
                stage_sizes.push((stage.name().to_string(), artifact.size_bytes));
                head = artifact;
            }
            StageOutcome::Skipped { reason } => {
                warn!(stage = stage.name(), reason = %reason, "stage skipped");
            }
        }
    }

    // Always materialize the output, even when every stage skipped and the
    // head is still the untouched input. A copy onto itself would truncate
    // the source before reading it, so when the head already is the output
    // file there is nothing to write.
    if !is_same_file(&head.path, &output_path) {
        tokio::fs::copy(&head.path, &output_path)
            .await
            .map_err(|e| PressError::finalize(&output_path, e))?;
    }
    let final_artifact = ModelArtifact::from_path(&output_path)?;

    info!(
        output = %output_path.display(),
        final_size = final_artifact.size_bytes,
        "optimization finished"
    );

    Ok(OptimizeReport {
        original_size_bytes: original.size_bytes,
        final_size_bytes: final_artifact.size_bytes,
        stage_sizes,
        output_path,
    })
}

/// True when both paths resolve to the same existing file.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::types::QuantizeMode;

    #[test]
    fn test_same_file_detection() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.onnx");
        let b = tmp.path().join("b.onnx");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"x").unwrap();

        assert!(is_same_file(&a, &a));
        assert!(!is_same_file(&a, &b));
        // A missing path is never the same file.
        assert!(!is_same_file(&a, &tmp.path().join("absent.onnx")));
    }

    #[tokio::test]
    async fn test_static_quantize_reason_reflects_calibration_data() {
        let tmp = tempfile::tempdir().unwrap();
        let input_path = tmp.path().join("m.onnx");
        std::fs::write(&input_path, b"model").unwrap();
        let input = ModelArtifact::from_path(&input_path).unwrap();
        let env = EngineEnv::new(tmp.path().join("data"));

        let without_data = OptimizeRequest {
            quantize: QuantizeMode::Static,
            ..Default::default()
        };
        let with_data = OptimizeRequest {
            quantize: QuantizeMode::Static,
            calibration_data: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };

        for (request, expected) in [
            (without_data, "requires calibration data"),
            (with_data, "not implemented"),
        ] {
            let stages = build_stages(&request, &env);
            assert_eq!(stages.len(), 1);
            match stages[0].apply(&input, &tmp.path().join("out.onnx")).await {
                StageOutcome::Skipped { reason } => {
                    assert!(reason.contains(expected), "unexpected reason: {reason}")
                }
                other => panic!("expected skip, got {other:?}"),
            }
        }
    }
}
