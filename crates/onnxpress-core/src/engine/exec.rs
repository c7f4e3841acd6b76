//! Engine script execution.
//!
//! Spawns a deployed engine script against an input/output path pair, waits
//! for exit, and parses the script's final JSON result line. Failures are
//! typed: an engine that cannot be resolved at all is `Unavailable`, while an
//! engine that ran and reported a problem is `Failed` — the two are distinct
//! conditions for callers.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::env::{Capability, EngineEnv, EngineKind};

/// A per-stage engine failure. Never propagated past the stage boundary;
/// stages convert these into skip reasons.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine's Python module is not resolvable.
    #[error("{reason}")]
    Unavailable { reason: String },

    /// The engine ran but reported an error (or produced no valid output).
    #[error("{message}")]
    Failed { message: String },
}

/// JSON result line emitted by every engine script on stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptResultLine {
    pub status: String,
    #[serde(default)]
    pub output_size: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Run an engine transformation: capability check, spawn, exit check, result
/// parse, output post-condition.
pub async fn run_engine(
    env: &EngineEnv,
    engine: EngineKind,
    input: &Path,
    output: &Path,
) -> Result<(), EngineError> {
    let python = match env.probe(engine).await {
        Capability::Available(python) => python,
        Capability::Unavailable { reason } => return Err(EngineError::Unavailable { reason }),
    };

    let script = env
        .script_path(engine)
        .map_err(|e| EngineError::Failed {
            message: format!("Failed to deploy engine script: {e}"),
        })?;

    debug!(
        "Running {:?} engine: {} {} --input {} --output {}",
        engine,
        python.display(),
        script.display(),
        input.display(),
        output.display()
    );

    let cmd_output = Command::new(&python)
        .arg(&script)
        .arg("--input")
        .arg(input)
        .arg("--output")
        .arg(output)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| EngineError::Failed {
            message: format!("Failed to spawn engine process: {e}"),
        })?;

    let stdout = String::from_utf8_lossy(&cmd_output.stdout);
    let result = parse_result_line(&stdout);

    if !cmd_output.status.success() {
        // Prefer the script's own error message over the raw exit status.
        let message = result
            .and_then(|r| r.message)
            .unwrap_or_else(|| {
                let stderr = String::from_utf8_lossy(&cmd_output.stderr);
                if stderr.trim().is_empty() {
                    format!(
                        "engine exited with status {}",
                        cmd_output.status.code().unwrap_or(-1)
                    )
                } else {
                    stderr.trim().to_string()
                }
            });
        return Err(EngineError::Failed { message });
    }

    match result {
        Some(line) if line.status == "ok" => {
            debug!(
                "Engine {:?} reported ok, output_size={:?}",
                engine, line.output_size
            );
        }
        Some(line) => {
            return Err(EngineError::Failed {
                message: line
                    .message
                    .unwrap_or_else(|| format!("engine reported status {:?}", line.status)),
            });
        }
        None => {
            return Err(EngineError::Failed {
                message: "engine produced no result line".to_string(),
            });
        }
    }

    // An engine never silently succeeds with a file it did not produce.
    if !output.exists() {
        return Err(EngineError::Failed {
            message: "engine reported success but produced no output file".to_string(),
        });
    }

    Ok(())
}

/// Parse the last JSON result line from a script's stdout.
fn parse_result_line(stdout: &str) -> Option<ScriptResultLine> {
    stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<ScriptResultLine>(line).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_line() {
        let line = parse_result_line(r#"{"status": "ok", "output_size": 1024}"#).unwrap();
        assert_eq!(line.status, "ok");
        assert_eq!(line.output_size, Some(1024));
    }

    #[test]
    fn test_parse_error_line() {
        let line =
            parse_result_line(r#"{"status": "error", "message": "check failed"}"#).unwrap();
        assert_eq!(line.status, "error");
        assert_eq!(line.message.as_deref(), Some("check failed"));
    }

    #[test]
    fn test_parse_takes_last_json_line() {
        let stdout = "some warning text\n\
                      {\"status\": \"error\", \"message\": \"early\"}\n\
                      {\"status\": \"ok\", \"output_size\": 7}\n";
        let line = parse_result_line(stdout).unwrap();
        assert_eq!(line.status, "ok");
    }

    #[test]
    fn test_parse_no_json() {
        assert!(parse_result_line("plain text only\n").is_none());
        assert!(parse_result_line("").is_none());
    }

    #[tokio::test]
    async fn test_run_engine_unavailable_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let env = EngineEnv::new(dir.path().join("data"));

        // Non-executable venv python makes every probe fail.
        let venv_python = env.venv_python();
        std::fs::create_dir_all(venv_python.parent().unwrap()).unwrap();
        std::fs::write(&venv_python, "").unwrap();

        let input = dir.path().join("model.onnx");
        let output = dir.path().join("out.onnx");
        std::fs::write(&input, b"model").unwrap();

        let err = run_engine(&env, EngineKind::Simplifier, &input, &output)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable { .. }));
        assert!(!output.exists());
    }
}
