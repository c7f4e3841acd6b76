//! Engine environment management and capability probing.
//!
//! Each optimization engine is a Python package that may or may not be
//! resolvable at runtime. Availability is a typed `Capability` value obtained
//! by probing `python -c "import <module>"` before a stage attempts any work —
//! never a caught failure mid-transformation.
//!
//! The environment owns a per-user data root holding the deployed engine
//! scripts and an optional dedicated virtual environment.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::scripts;
use crate::{PressError, Result};

/// The external engines the pipeline can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// onnxsim graph simplification.
    Simplifier,
    /// onnxconverter-common FP16 conversion.
    Fp16Converter,
    /// onnxruntime INT8 quantization.
    Quantizer,
    /// onnxruntime session-based graph optimization.
    GraphOptimizer,
}

impl EngineKind {
    /// Python module probed to decide availability.
    pub fn module(&self) -> &'static str {
        match self {
            EngineKind::Simplifier => "onnxsim",
            EngineKind::Fp16Converter => "onnxconverter_common",
            EngineKind::Quantizer => "onnxruntime.quantization",
            EngineKind::GraphOptimizer => "onnxruntime",
        }
    }

    /// pip package named in the install remedy.
    pub fn pip_package(&self) -> &'static str {
        match self {
            EngineKind::Simplifier => "onnxsim",
            EngineKind::Fp16Converter => "onnxconverter-common",
            EngineKind::Quantizer | EngineKind::GraphOptimizer => "onnxruntime",
        }
    }

    /// Deployed script filename implementing this engine's transformation.
    pub fn script(&self) -> &'static str {
        match self {
            EngineKind::Simplifier => "simplify.py",
            EngineKind::Fp16Converter => "fp16.py",
            EngineKind::Quantizer => "quantize_dynamic.py",
            EngineKind::GraphOptimizer => "graph_optimize.py",
        }
    }
}

/// Result of an engine capability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Engine importable via this Python interpreter.
    Available(PathBuf),
    /// Engine missing; carries a human-readable reason with an install remedy.
    Unavailable { reason: String },
}

/// Engine environment: data root, venv, script deployment, capability probes.
#[derive(Debug, Clone)]
pub struct EngineEnv {
    data_root: PathBuf,
}

impl EngineEnv {
    /// Create an environment rooted at `data_root`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    /// Default per-user data root (`~/.cache/onnxpress`, falling back to the
    /// system temp directory when no cache dir is resolvable).
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("onnxpress")
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Path to the engine virtual environment directory.
    fn venv_dir(&self) -> PathBuf {
        self.data_root.join("engine-venv")
    }

    /// Path to the Python binary inside the engine venv.
    pub fn venv_python(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_dir().join("Scripts").join("python.exe")
        } else {
            self.venv_dir().join("bin").join("python")
        }
    }

    /// Resolve the Python interpreter: the dedicated venv when present,
    /// otherwise the system `python3`.
    pub fn python(&self) -> PathBuf {
        let venv_python = self.venv_python();
        if venv_python.exists() {
            venv_python
        } else {
            PathBuf::from("python3")
        }
    }

    /// Path to a deployed engine script, deploying all scripts if needed.
    pub fn script_path(&self, engine: EngineKind) -> Result<PathBuf> {
        scripts::ensure_scripts_deployed(&self.data_root)?;
        Ok(scripts::scripts_dir(&self.data_root).join(engine.script()))
    }

    /// Query whether an engine's Python module is importable.
    ///
    /// This is the capability check stages run before touching the
    /// filesystem. A failed probe yields a reason naming the missing package
    /// and the pip install remedy.
    pub async fn probe(&self, engine: EngineKind) -> Capability {
        let python = self.python();
        let probe = Command::new(&python)
            .arg("-c")
            .arg(format!("import {}", engine.module()))
            .output()
            .await;

        match probe {
            Ok(output) if output.status.success() => {
                debug!("Engine {:?} available via {}", engine, python.display());
                Capability::Available(python)
            }
            Ok(_) => Capability::Unavailable {
                reason: format!(
                    "{} not installed. Install with: {} -m pip install {}",
                    engine.module(),
                    python.display(),
                    engine.pip_package()
                ),
            },
            Err(e) => Capability::Unavailable {
                reason: format!("Python interpreter {} not runnable: {e}", python.display()),
            },
        }
    }

    /// Ensure the dedicated engine environment is set up.
    ///
    /// Deploys the scripts, creates the venv if missing, upgrades pip, and
    /// installs the engine requirements.
    pub async fn ensure_environment(&self) -> Result<()> {
        scripts::ensure_scripts_deployed(&self.data_root)?;

        let venv = self.venv_dir();
        let python = self.venv_python();

        if python.exists() {
            debug!("Engine venv already exists at {}", venv.display());
            return Ok(());
        }

        info!("Creating engine virtual environment at {}", venv.display());

        let output = Command::new("python3")
            .args(["-m", "venv", &venv.to_string_lossy()])
            .output()
            .await
            .map_err(|e| PressError::EnvSetup {
                message: format!("Failed to run python3 -m venv: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PressError::EnvSetup {
                message: format!(
                    "Failed to create Python venv. Ensure python3 is installed. Error: {stderr}"
                ),
            });
        }

        let output = Command::new(&python)
            .args(["-m", "pip", "install", "--upgrade", "pip"])
            .output()
            .await
            .map_err(|e| PressError::EnvSetup {
                message: format!("Failed to upgrade pip: {e}"),
            })?;

        if !output.status.success() {
            warn!(
                "pip upgrade failed (non-fatal): {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let requirements = scripts::scripts_dir(&self.data_root).join("requirements.txt");
        info!("Installing engine dependencies...");

        let output = Command::new(&python)
            .args([
                "-m",
                "pip",
                "install",
                "-r",
                &requirements.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| PressError::EnvSetup {
                message: format!("Failed to install engine dependencies: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PressError::EnvSetup {
                message: format!("Failed to install engine dependencies: {stderr}"),
            });
        }

        info!("Engine environment ready");
        Ok(())
    }
}

impl Default for EngineEnv {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_modules() {
        assert_eq!(EngineKind::Simplifier.module(), "onnxsim");
        assert_eq!(EngineKind::Fp16Converter.module(), "onnxconverter_common");
        assert_eq!(EngineKind::Quantizer.module(), "onnxruntime.quantization");
        assert_eq!(EngineKind::GraphOptimizer.module(), "onnxruntime");
    }

    #[test]
    fn test_pip_remedy_packages() {
        assert_eq!(EngineKind::Fp16Converter.pip_package(), "onnxconverter-common");
        assert_eq!(EngineKind::Quantizer.pip_package(), "onnxruntime");
    }

    #[test]
    fn test_python_falls_back_to_system() {
        let dir = tempfile::tempdir().unwrap();
        let env = EngineEnv::new(dir.path());
        assert_eq!(env.python(), PathBuf::from("python3"));
    }

    #[test]
    fn test_python_prefers_venv_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let env = EngineEnv::new(dir.path());

        let venv_python = env.venv_python();
        std::fs::create_dir_all(venv_python.parent().unwrap()).unwrap();
        std::fs::write(&venv_python, "").unwrap();

        assert_eq!(env.python(), venv_python);
    }

    #[test]
    fn test_script_path_deploys() {
        let dir = tempfile::tempdir().unwrap();
        let env = EngineEnv::new(dir.path());

        let path = env.script_path(EngineKind::Simplifier).unwrap();
        assert!(path.exists());
        assert!(path.ends_with("simplify.py"));
    }

    #[tokio::test]
    async fn test_probe_with_unrunnable_python_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let env = EngineEnv::new(dir.path());

        // Point the venv python at a file that is not executable.
        let venv_python = env.venv_python();
        std::fs::create_dir_all(venv_python.parent().unwrap()).unwrap();
        std::fs::write(&venv_python, "not a binary").unwrap();

        match env.probe(EngineKind::Simplifier).await {
            Capability::Unavailable { reason } => {
                assert!(!reason.is_empty());
            }
            Capability::Available(_) => panic!("bogus interpreter reported available"),
        }
    }
}
