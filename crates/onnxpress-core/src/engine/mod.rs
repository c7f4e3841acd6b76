//! External optimization engines.
//!
//! Engines are Python packages invoked out-of-process. Each one is a
//! capability that may be absent at runtime; the pipeline queries
//! availability with a typed probe before a stage does any work.

mod env;
mod exec;
pub(crate) mod scripts;

pub use env::{Capability, EngineEnv, EngineKind};
pub use exec::{run_engine, EngineError, ScriptResultLine};
