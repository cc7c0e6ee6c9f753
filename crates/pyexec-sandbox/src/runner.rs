//! Run one caller-supplied script inside the installation's interpreter.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use pyexec_core::observability;
use tempfile::TempPath;

use crate::common::{format_secs, run_with_timeout, WaitOutcome};
use crate::env::builder::Installation;
use crate::error::Result;
use crate::result::ExecutionResult;

pub const INIT_FAILED_MESSAGE: &str = "Failed to initialize sandbox environment";

/// The temporary `.py` file holding one script.
///
/// Removed when dropped, on every exit path. Removal failures are logged and
/// never change the outcome of the run.
#[derive(Debug)]
pub(crate) struct ScriptArtifact {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl ScriptArtifact {
    pub(crate) fn create(code: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("pyexec_")
            .suffix(".py")
            .tempfile()?;
        file.write_all(code.as_bytes())?;
        file.flush()?;
        // Closes our handle so the interpreter can open the file on every platform.
        let temp = file.into_temp_path();
        Ok(Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScriptArtifact {
    fn drop(&mut self) {
        if let Some(temp) = self.temp.take() {
            if let Err(e) = temp.close() {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up temp file"
                );
            }
        }
    }
}

/// Execute `code` with the installation's interpreter under `timeout`.
///
/// A script that exits non-zero is an ordinary result (`success == false`,
/// streams populated, no `error_message`). Initialization failures, timeouts
/// and system faults produce `error_message` and `return_code == -1`.
pub fn execute(installation: &mut Installation, code: &str, timeout: Duration) -> ExecutionResult {
    if !installation.ensure_ready() {
        return ExecutionResult::failure(INIT_FAILED_MESSAGE);
    }

    let env_dir = installation.location().to_string_lossy().to_string();
    observability::audit_execution_started(&env_dir, code.len(), timeout.as_secs_f64());
    let started = Instant::now();

    let (result, timed_out) = match run_script(&installation.python_path(), code, timeout) {
        Ok(WaitOutcome::Exited {
            stdout,
            stderr,
            code,
        }) => {
            tracing::debug!(exit_code = code, "Script finished");
            (ExecutionResult::from_exit(stdout, stderr, code), false)
        }
        Ok(WaitOutcome::TimedOut) => {
            tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Script execution timed out");
            (
                ExecutionResult::failure(format!(
                    "Execution timed out after {} seconds",
                    format_secs(timeout)
                )),
                true,
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Unexpected error during code execution");
            (ExecutionResult::failure(format!("System error: {}", e)), false)
        }
    };

    observability::audit_execution_completed(
        &env_dir,
        result.return_code,
        started.elapsed().as_millis() as u64,
        result.stdout.len(),
        timed_out,
    );
    result
}

/// `<python> <artifact>` with the artifact's directory as working directory.
fn run_script(python: &Path, code: &str, timeout: Duration) -> Result<WaitOutcome> {
    let artifact = ScriptArtifact::create(code)?;
    let mut cmd = Command::new(python);
    cmd.arg(artifact.path());
    if let Some(dir) = artifact.path().parent() {
        cmd.current_dir(dir);
    }
    run_with_timeout(&mut cmd, timeout)
}
