//! Stage plan resolution and output path derivation.
//!
//! The stage order is fixed regardless of how flags were supplied:
//! simplify, then fp16, then quantize, then graph-optimize. At most one
//! quantize stage ever appears in a plan.

use std::path::{Path, PathBuf};

use super::types::{OptimizeRequest, QuantizeMode};

/// The planned stage identities, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedStage {
    Simplify,
    Fp16,
    DynamicQuantize,
    StaticQuantize,
    GraphOptimize,
}

/// Resolve the ordered stage plan for a request.
///
/// Empty when no stage was requested; the pipeline treats that as a fatal
/// usage error before anything runs.
pub fn resolve_plan(request: &OptimizeRequest) -> Vec<PlannedStage> {
    let mut plan = Vec::new();

    if request.wants_simplify() {
        plan.push(PlannedStage::Simplify);
    }
    if request.wants_fp16() {
        plan.push(PlannedStage::Fp16);
    }
    match request.effective_quantize() {
        QuantizeMode::Dynamic => plan.push(PlannedStage::DynamicQuantize),
        QuantizeMode::Static => plan.push(PlannedStage::StaticQuantize),
        QuantizeMode::None => {}
    }
    if request.wants_graph_optimize() {
        plan.push(PlannedStage::GraphOptimize);
    }

    plan
}

/// Resolve the output path for a run.
///
/// An explicit output path wins verbatim. Otherwise the filename is derived
/// from the requested stage set with suffix tokens in fixed order —
/// `simplified`, `fp16`, `quantized`, `optimized` — joined with `_`, falling
/// back to the literal `optimized` when nothing was selected. Pure: no I/O.
pub fn resolve_output_path(input: &Path, request: &OptimizeRequest) -> PathBuf {
    if let Some(explicit) = &request.output {
        return explicit.clone();
    }

    let mut tokens: Vec<&str> = Vec::new();
    if request.wants_simplify() {
        tokens.push("simplified");
    }
    if request.wants_fp16() {
        tokens.push("fp16");
    }
    if request.effective_quantize() != QuantizeMode::None {
        tokens.push("quantized");
    }
    if request.wants_graph_optimize() {
        tokens.push("optimized");
    }

    let suffix = if tokens.is_empty() {
        "optimized".to_string()
    } else {
        tokens.join("_")
    };

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = input.parent().unwrap_or_else(|| Path::new(""));

    parent.join(format!("{stem}_{suffix}.onnx"))
}
