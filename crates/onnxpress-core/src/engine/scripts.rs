//! Embedded Python engine scripts and deployment utilities.
//!
//! Each optimization engine is a small Python script stored as a string
//! constant and written to disk on first use or when the embedded version
//! changes (detected via hash comparison). Every script takes `--input` and
//! `--output` paths and emits a single JSON result line on stdout:
//! `{"status": "ok", "output_size": N}` or `{"status": "error", "message": ...}`.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::{PressError, Result};

/// Python requirements for the engine virtual environment.
pub const REQUIREMENTS: &str = "\
onnx>=1.15.0
onnxsim>=0.4.0
onnxconverter-common>=1.14.0
onnxruntime>=1.17.0
";

/// Graph simplification via onnxsim (constant folding, redundant node removal).
pub const SIMPLIFY_SCRIPT: &str = r#"#!/usr/bin/env python3
"""Simplify an ONNX model with onnxsim.

Emits a single JSON result line on stdout.
"""
import argparse
import json
import os
import sys

def result(status, **kwargs):
    print(json.dumps({"status": status, **kwargs}), flush=True)

def main():
    parser = argparse.ArgumentParser(description="Simplify ONNX model")
    parser.add_argument("--input", required=True)
    parser.add_argument("--output", required=True)
    args = parser.parse_args()

    try:
        import onnx
        import onnxsim
    except ImportError as e:
        result("error", message=f"Missing required package: {e}")
        sys.exit(1)

    try:
        model = onnx.load(args.input)
        simplified, check = onnxsim.simplify(model)
        if not check:
            result("error", message="simplifier verification check failed")
            sys.exit(1)
        onnx.save(simplified, args.output)
    except Exception as e:
        result("error", message=str(e))
        sys.exit(1)

    result("ok", output_size=os.path.getsize(args.output))

if __name__ == "__main__":
    main()
"#;

/// FP32 to FP16 precision conversion via onnxconverter-common.
pub const FP16_SCRIPT: &str = r#"#!/usr/bin/env python3
"""Convert an FP32 ONNX model to FP16, preserving declared I/O tensor types.

Emits a single JSON result line on stdout.
"""
import argparse
import json
import os
import sys

def result(status, **kwargs):
    print(json.dumps({"status": status, **kwargs}), flush=True)

def main():
    parser = argparse.ArgumentParser(description="Convert ONNX model to FP16")
    parser.add_argument("--input", required=True)
    parser.add_argument("--output", required=True)
    args = parser.parse_args()

    try:
        import onnx
        from onnxconverter_common import float16
    except ImportError as e:
        result("error", message=f"Missing required package: {e}")
        sys.exit(1)

    try:
        model = onnx.load(args.input)
        converted = float16.convert_float_to_float16(model, keep_io_types=True)
        onnx.save(converted, args.output)
    except Exception as e:
        result("error", message=str(e))
        sys.exit(1)

    result("ok", output_size=os.path.getsize(args.output))

if __name__ == "__main__":
    main()
"#;

/// Weight-only INT8 dynamic quantization via onnxruntime.
pub const QUANTIZE_DYNAMIC_SCRIPT: &str = r#"#!/usr/bin/env python3
"""Apply dynamic INT8 quantization with onnxruntime.

Emits a single JSON result line on stdout.
"""
import argparse
import json
import os
import sys

def result(status, **kwargs):
    print(json.dumps({"status": status, **kwargs}), flush=True)

def main():
    parser = argparse.ArgumentParser(description="Dynamically quantize ONNX model")
    parser.add_argument("--input", required=True)
    parser.add_argument("--output", required=True)
    args = parser.parse_args()

    try:
        from onnxruntime.quantization import quantize_dynamic, QuantType
    except ImportError as e:
        result("error", message=f"Missing required package: {e}")
        sys.exit(1)

    try:
        quantize_dynamic(args.input, args.output, weight_type=QuantType.QInt8)
    except Exception as e:
        result("error", message=str(e))
        sys.exit(1)

    result("ok", output_size=os.path.getsize(args.output))

if __name__ == "__main__":
    main()
"#;

/// Runtime graph optimization: constructing an onnxruntime session with
/// `optimized_model_filepath` set writes the optimized graph as a side effect.
pub const GRAPH_OPTIMIZE_SCRIPT: &str = r#"#!/usr/bin/env python3
"""Apply onnxruntime graph optimizations (ORT_ENABLE_ALL).

Emits a single JSON result line on stdout.
"""
import argparse
import json
import os
import sys

def result(status, **kwargs):
    print(json.dumps({"status": status, **kwargs}), flush=True)

def main():
    parser = argparse.ArgumentParser(description="Optimize ONNX graph with onnxruntime")
    parser.add_argument("--input", required=True)
    parser.add_argument("--output", required=True)
    args = parser.parse_args()

    try:
        from onnxruntime import SessionOptions, GraphOptimizationLevel, InferenceSession
    except ImportError as e:
        result("error", message=f"Missing required package: {e}")
        sys.exit(1)

    try:
        opts = SessionOptions()
        opts.graph_optimization_level = GraphOptimizationLevel.ORT_ENABLE_ALL
        opts.optimized_model_filepath = args.output
        InferenceSession(args.input, opts, providers=["CPUExecutionProvider"])
    except Exception as e:
        result("error", message=str(e))
        sys.exit(1)

    result("ok", output_size=os.path.getsize(args.output))

if __name__ == "__main__":
    main()
"#;

/// Compute a short hash of a string for staleness checking.
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..8])
}

/// Get the path to the deployed engine scripts directory.
pub fn scripts_dir(data_root: &Path) -> PathBuf {
    data_root.join("engine-scripts")
}

/// Deploy embedded scripts to disk if missing or outdated.
///
/// Uses a `.hash` sidecar file to detect when the embedded script has changed
/// and needs to be rewritten.
pub fn ensure_scripts_deployed(data_root: &Path) -> Result<()> {
    let dir = scripts_dir(data_root);
    std::fs::create_dir_all(&dir)
        .map_err(|e| PressError::io("creating engine scripts dir", &dir, e))?;

    deploy_script(&dir, "simplify.py", SIMPLIFY_SCRIPT)?;
    deploy_script(&dir, "fp16.py", FP16_SCRIPT)?;
    deploy_script(&dir, "quantize_dynamic.py", QUANTIZE_DYNAMIC_SCRIPT)?;
    deploy_script(&dir, "graph_optimize.py", GRAPH_OPTIMIZE_SCRIPT)?;
    deploy_script(&dir, "requirements.txt", REQUIREMENTS)?;

    info!("Engine scripts deployed to {}", dir.display());
    Ok(())
}

fn deploy_script(dir: &Path, filename: &str, content: &str) -> Result<()> {
    let script_path = dir.join(filename);
    let hash_path = dir.join(format!("{}.hash", filename));
    let current_hash = content_hash(content);

    if script_path.exists() {
        if let Ok(stored_hash) = std::fs::read_to_string(&hash_path) {
            if stored_hash.trim() == current_hash {
                return Ok(());
            }
        }
    }

    std::fs::write(&script_path, content)
        .map_err(|e| PressError::io("writing engine script", &script_path, e))?;
    std::fs::write(&hash_path, &current_hash)
        .map_err(|e| PressError::io("writing script hash", &hash_path, e))?;
    Ok(())
}
