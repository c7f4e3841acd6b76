//! Model optimization pipeline: plan resolution, scratch management,
//! stages, and the runner.

mod pipeline;
mod plan;
mod report;
mod scratch;
mod stage;
mod types;

pub use pipeline::{run, run_with};
pub use plan::{resolve_output_path, resolve_plan, PlannedStage};
pub use report::OptimizeReport;
pub use scratch::ScratchSpace;
pub use stage::{
    CalibrationDataset, CalibrationReader, DynamicQuantizeStage, Fp16Stage, GraphOptimizeStage,
    SimplifyStage, Stage, StaticQuantizeStage,
};
pub use types::{OptimizeRequest, QuantizeMode, StageOutcome};
