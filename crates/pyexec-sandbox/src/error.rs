//! Internal faults of the sandbox engine.
//!
//! These never cross the public `Sandbox` API: every operation converts them
//! into an `ExecutionResult` with an `error_message`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("No base Python interpreter found (tried {tried}); set PYEXEC_PYTHON")]
    BasePythonNotFound { tried: String },

    #[error("venv creation failed (exit code {code}): {stderr}")]
    VenvFailed { code: i32, stderr: String },

    #[error("Python executable not found at: {}", .0.display())]
    InterpreterMissing(PathBuf),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Provision(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
