//! Types for optimization pipeline requests and stage outcomes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact::ModelArtifact;

/// Quantization mode for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizeMode {
    /// No quantization stage.
    #[default]
    None,
    /// Weight-only dynamic INT8 quantization.
    Dynamic,
    /// Static INT8 quantization (requires calibration data).
    Static,
}

/// Request to optimize a model: which stages to run and where to write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizeRequest {
    /// Graph simplification (redundant node removal, constant folding).
    #[serde(default)]
    pub simplify: bool,
    /// FP32 to FP16 precision conversion.
    #[serde(default)]
    pub fp16: bool,
    /// INT8 quantization mode.
    #[serde(default)]
    pub quantize: QuantizeMode,
    /// Runtime graph optimization.
    #[serde(default)]
    pub graph_optimize: bool,
    /// Enable every stage. Quantization defaults to dynamic unless `quantize`
    /// was explicitly set to static.
    #[serde(default)]
    pub all: bool,
    /// Calibration data path for static quantization.
    #[serde(default)]
    pub calibration_data: Option<PathBuf>,
    /// Explicit output path (auto-generated from the stage set if omitted).
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl OptimizeRequest {
    pub fn wants_simplify(&self) -> bool {
        self.simplify || self.all
    }

    pub fn wants_fp16(&self) -> bool {
        self.fp16 || self.all
    }

    /// The quantization mode after `all` resolution: `all` implies dynamic
    /// unless static was explicitly requested.
    pub fn effective_quantize(&self) -> QuantizeMode {
        match (self.quantize, self.all) {
            (QuantizeMode::Static, _) => QuantizeMode::Static,
            (QuantizeMode::Dynamic, _) => QuantizeMode::Dynamic,
            (QuantizeMode::None, true) => QuantizeMode::Dynamic,
            (QuantizeMode::None, false) => QuantizeMode::None,
        }
    }

    pub fn wants_graph_optimize(&self) -> bool {
        self.graph_optimize || self.all
    }

    /// True when no stage at all was requested.
    pub fn is_empty(&self) -> bool {
        !self.wants_simplify()
            && !self.wants_fp16()
            && self.effective_quantize() == QuantizeMode::None
            && !self.wants_graph_optimize()
    }
}

/// Outcome of one stage invocation.
///
/// Skip-vs-complete is a first-class value: a stage that could not apply
/// (missing engine, missing calibration data, engine execution failure)
/// reports `Skipped` with a human-readable reason rather than raising.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage produced and validated a new artifact.
    Completed(ModelArtifact),
    /// The stage did not apply; the head artifact is unchanged.
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }
}
