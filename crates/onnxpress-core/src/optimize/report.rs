//! Run summary produced by the pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sizes observed across a pipeline run, plus where the final model landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeReport {
    pub original_size_bytes: u64,
    pub final_size_bytes: u64,
    /// (stage name, size after that stage), completed stages only, in
    /// pipeline order.
    pub stage_sizes: Vec<(String, u64)>,
    pub output_path: PathBuf,
}

impl OptimizeReport {
    /// Percentage reduction from original to final. Negative when the
    /// model grew; zero for an empty original so the math never divides
    /// by zero.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size_bytes == 0 {
            return 0.0;
        }
        let original = self.original_size_bytes as f64;
        let fin = self.final_size_bytes as f64;
        (original - fin) / original * 100.0
    }

    /// True when at least one stage completed.
    pub fn any_completed(&self) -> bool {
        !self.stage_sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(original: u64, fin: u64) -> OptimizeReport {
        OptimizeReport {
            original_size_bytes: original,
            final_size_bytes: fin,
            stage_sizes: vec![],
            output_path: PathBuf::from("/tmp/out.onnx"),
        }
    }

    #[test]
    fn test_reduction_basic() {
        assert!((report(1000, 250).reduction_percent() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reduction_zero_original() {
        assert_eq!(report(0, 100).reduction_percent(), 0.0);
    }

    #[test]
    fn test_reduction_negative_when_model_grew() {
        assert!(report(100, 150).reduction_percent() < 0.0);
    }
}
