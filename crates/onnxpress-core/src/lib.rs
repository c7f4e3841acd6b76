//! Headless library for ONNX model optimization.
//!
//! Runs a fixed-order pipeline of optimization stages — simplify, fp16
//! conversion, quantization, and graph optimization — over a model file,
//! delegating the actual graph work to Python engines managed in a local
//! virtual environment. Stages whose engine is missing or fails are
//! skipped, never fatal; the pipeline always produces an output model.
//!
//! # Example
//!
//! ```rust,ignore
//! use onnxpress::{optimize, EngineEnv, OptimizeRequest};
//!
//! #[tokio::main]
//! async fn main() -> onnxpress::Result<()> {
//!     let env = EngineEnv::default();
//!     let request = OptimizeRequest {
//!         all: true,
//!         ..Default::default()
//!     };
//!
//!     let report = optimize::run("model.onnx".as_ref(), &request, &env).await?;
//!     println!(
//!         "{} -> {} ({:.1}% smaller)",
//!         report.original_size_bytes,
//!         report.final_size_bytes,
//!         report.reduction_percent()
//!     );
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod engine;
pub mod error;
pub mod optimize;

// Re-export commonly used types
pub use artifact::{human_bytes, ModelArtifact};
pub use engine::{Capability, EngineEnv, EngineKind};
pub use error::{PressError, Result};
pub use optimize::{
    CalibrationDataset, CalibrationReader, OptimizeReport, OptimizeRequest, QuantizeMode, Stage,
    StageOutcome,
};
