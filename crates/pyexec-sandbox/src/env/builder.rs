//! Build and verify the isolated Python installation (venv).

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Context;
use pyexec_core::observability;

use crate::common::{run_with_timeout, WaitOutcome, VERSION_QUERY_TIMEOUT_SECS};
use crate::error::{Result, SandboxError};
use crate::info_log;
use crate::result::ExecutionResult;

pub const RESET_OK_MESSAGE: &str = "Sandbox environment has been reset successfully.";
pub const RECREATE_FAILED_MESSAGE: &str = "Failed to recreate sandbox environment";
pub const VERSION_NOT_INITIALIZED: &str = "Unknown (sandbox not initialized)";
pub const VERSION_UNKNOWN: &str = "Unknown";

/// Interpreter inside a venv rooted at `location`.
pub fn python_path(location: &Path) -> PathBuf {
    if cfg!(windows) {
        location.join("Scripts").join("python.exe")
    } else {
        location.join("bin").join("python")
    }
}

/// pip front end inside a venv rooted at `location`.
pub fn pip_path(location: &Path) -> PathBuf {
    if cfg!(windows) {
        location.join("Scripts").join("pip.exe")
    } else {
        location.join("bin").join("pip")
    }
}

/// Extension point for creating a fresh installation.
///
/// `provision` is only called when `location` does not exist. It must leave
/// an interpreter at [`python_path`] and a usable pip behind.
pub trait Provisioner: Send + Sync {
    /// Provisioner name for logging and diagnostics.
    fn name(&self) -> &str;

    /// Create a fresh installation at `location`.
    fn provision(&self, location: &Path) -> anyhow::Result<()>;
}

/// Default provisioner: `<base python> -m venv <location>` (pip included).
#[derive(Debug, Clone, Default)]
pub struct VenvProvisioner {
    /// Explicit base interpreter; `None` searches PATH for `python3`, then `python`.
    base_python: Option<PathBuf>,
}

impl VenvProvisioner {
    pub fn new(base_python: Option<PathBuf>) -> Self {
        Self { base_python }
    }

    fn resolve_base_python(&self) -> Result<PathBuf> {
        if let Some(ref python) = self.base_python {
            return which::which(python).map_err(|_| SandboxError::BasePythonNotFound {
                tried: python.display().to_string(),
            });
        }
        const CANDIDATES: [&str; 2] = ["python3", "python"];
        CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| SandboxError::BasePythonNotFound {
                tried: CANDIDATES.join(", "),
            })
    }
}

impl Provisioner for VenvProvisioner {
    fn name(&self) -> &str {
        "venv"
    }

    fn provision(&self, location: &Path) -> anyhow::Result<()> {
        let python = self.resolve_base_python()?;
        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Create parent of {}", location.display()))?;
        }

        tracing::debug!(base_python = %python.display(), "Running -m venv");
        let out = Command::new(&python)
            .arg("-m")
            .arg("venv")
            .arg(location)
            .output()
            .with_context(|| format!("Spawn {} -m venv", python.display()))?;
        if !out.status.success() {
            return Err(SandboxError::VenvFailed {
                code: out.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// The isolated installation and its cached readiness.
pub struct Installation {
    location: PathBuf,
    ready: bool,
    provisioner: Box<dyn Provisioner>,
}

impl fmt::Debug for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installation")
            .field("location", &self.location)
            .field("ready", &self.ready)
            .field("provisioner", &self.provisioner.name())
            .finish()
    }
}

impl Installation {
    pub fn new(location: PathBuf, provisioner: Box<dyn Provisioner>) -> Self {
        Self {
            location,
            ready: false,
            provisioner,
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn python_path(&self) -> PathBuf {
        python_path(&self.location)
    }

    pub fn pip_path(&self) -> PathBuf {
        pip_path(&self.location)
    }

    /// Cached readiness; does not touch the filesystem.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Make sure the installation exists and its interpreter is present.
    ///
    /// The fast path costs one `stat` of the interpreter. Creation only happens
    /// when the location is absent; faults are logged and reported as `false`.
    pub fn ensure_ready(&mut self) -> bool {
        if self.ready && self.python_path().exists() {
            return true;
        }
        self.ready = false;

        if !self.location.exists() {
            info_log!("Creating sandbox environment at: {}", self.location.display());
            if let Err(e) = self.create() {
                tracing::error!(
                    provisioner = self.provisioner.name(),
                    error = %e,
                    "Failed to create sandbox environment"
                );
                return false;
            }
            info_log!("Sandbox environment created successfully");
        }

        let python = self.python_path();
        if !python.exists() {
            tracing::error!("{}", SandboxError::InterpreterMissing(python));
            return false;
        }

        self.ready = true;
        true
    }

    /// Provision a fresh installation. A failed attempt leaves no directory
    /// behind so that the next `ensure_ready` retries from scratch.
    fn create(&self) -> Result<()> {
        match self.provisioner.provision(&self.location) {
            Ok(()) => Ok(()),
            Err(e) => {
                if self.location.exists() {
                    if let Err(cleanup) = std::fs::remove_dir_all(&self.location) {
                        tracing::warn!(
                            error = %cleanup,
                            "Failed to remove partial environment at {}",
                            self.location.display()
                        );
                    }
                }
                Err(SandboxError::Provision(e))
            }
        }
    }

    /// Delete the installation and recreate it from scratch.
    pub fn reset(&mut self) -> ExecutionResult {
        let env_dir = self.location.to_string_lossy().to_string();
        let result = match self.teardown() {
            Ok(()) => {
                if self.ensure_ready() {
                    ExecutionResult::ok_message(RESET_OK_MESSAGE)
                } else {
                    ExecutionResult::failure(RECREATE_FAILED_MESSAGE)
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reset sandbox environment");
                ExecutionResult::failure(format!("Failed to reset environment: {}", e))
            }
        };
        observability::audit_environment_reset(&env_dir, result.success);
        result
    }

    fn teardown(&mut self) -> Result<()> {
        self.ready = false;
        info_log!("Removing existing sandbox at: {}", self.location.display());
        match std::fs::remove_dir_all(&self.location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// `python --version` of the installation (creates it if needed).
    pub fn python_version(&mut self) -> String {
        if !self.ensure_ready() {
            return VERSION_NOT_INITIALIZED.to_string();
        }
        let mut cmd = Command::new(self.python_path());
        cmd.arg("--version");
        match run_with_timeout(&mut cmd, Duration::from_secs(VERSION_QUERY_TIMEOUT_SECS)) {
            Ok(WaitOutcome::Exited { stdout, stderr, .. }) => {
                // Python 2 printed the version on stderr.
                let version = if stdout.trim().is_empty() { stderr } else { stdout };
                version.trim().to_string()
            }
            Ok(WaitOutcome::TimedOut) => VERSION_UNKNOWN.to_string(),
            Err(e) => {
                tracing::debug!(error = %e, "python --version failed");
                VERSION_UNKNOWN.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMode, FakeProvisioner};
    use std::sync::atomic::Ordering;

    fn installation(mode: FakeMode) -> (tempfile::TempDir, Installation, FakeProvisioner) {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeProvisioner::new(mode);
        let inst = Installation::new(dir.path().join("sandbox"), Box::new(fake.clone()));
        (dir, inst, fake)
    }

    #[test]
    fn test_paths_are_derived_from_location() {
        let location = Path::new("/opt/venv");
        if cfg!(windows) {
            assert_eq!(python_path(location), location.join("Scripts").join("python.exe"));
            assert_eq!(pip_path(location), location.join("Scripts").join("pip.exe"));
        } else {
            assert_eq!(python_path(location), PathBuf::from("/opt/venv/bin/python"));
            assert_eq!(pip_path(location), PathBuf::from("/opt/venv/bin/pip"));
        }
    }

    #[test]
    fn test_ensure_ready_is_idempotent() {
        let (_dir, mut inst, fake) = installation(FakeMode::Interpreter);
        assert!(!inst.is_ready());
        assert!(inst.ensure_ready());
        assert!(inst.ensure_ready());
        assert!(inst.is_ready());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_existing_location_is_reused() {
        let (_dir, mut inst, fake) = installation(FakeMode::Interpreter);
        assert!(inst.ensure_ready());

        // A new handle over the same directory (process restart) creates nothing.
        let fresh = FakeProvisioner::new(FakeMode::Interpreter);
        let mut restarted = Installation::new(inst.location().to_path_buf(), Box::new(fresh.clone()));
        assert!(restarted.ensure_ready());
        assert_eq!(fresh.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_creation_failure_is_retried_later() {
        let (_dir, mut inst, fake) = installation(FakeMode::Fail);
        assert!(!inst.ensure_ready());
        assert!(!inst.is_ready());
        assert!(!inst.location().exists(), "partial environment must be removed");
        assert!(!inst.ensure_ready());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_interpreter_is_not_ready() {
        let (_dir, mut inst, _fake) = installation(FakeMode::NoInterpreter);
        assert!(!inst.ensure_ready());
        assert!(inst.location().exists());
        assert!(!inst.is_ready());
    }

    #[test]
    fn test_out_of_band_deletion_is_detected() {
        let (_dir, mut inst, fake) = installation(FakeMode::Interpreter);
        assert!(inst.ensure_ready());
        std::fs::remove_dir_all(inst.location()).unwrap();
        assert!(inst.ensure_ready());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_recreates() {
        let (_dir, mut inst, fake) = installation(FakeMode::Interpreter);
        assert!(inst.ensure_ready());
        let marker = inst.location().join("site-marker");
        std::fs::write(&marker, "installed package").unwrap();

        let result = inst.reset();
        assert!(result.success, "{result}");
        assert_eq!(result.stdout, RESET_OK_MESSAGE);
        assert!(result.error_message.is_none());
        assert!(inst.location().exists());
        assert!(inst.is_ready());
        assert!(!marker.exists());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_without_existing_installation() {
        let (_dir, mut inst, _fake) = installation(FakeMode::Interpreter);
        let result = inst.reset();
        assert!(result.success);
        assert!(inst.is_ready());
    }

    #[test]
    fn test_reset_reports_recreation_failure() {
        let (_dir, mut inst, _fake) = installation(FakeMode::NoInterpreter);
        let result = inst.reset();
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some(RECREATE_FAILED_MESSAGE));
        assert_eq!(result.to_string(), format!("Error: {}", RECREATE_FAILED_MESSAGE));
    }

    #[test]
    fn test_python_version_when_not_initialized() {
        let (_dir, mut inst, _fake) = installation(FakeMode::Fail);
        assert_eq!(inst.python_version(), VERSION_NOT_INITIALIZED);
    }

    #[cfg(unix)]
    #[test]
    fn test_python_version_reads_interpreter() {
        let (_dir, mut inst, _fake) = installation(FakeMode::Interpreter);
        assert_eq!(inst.python_version(), "Python 3.12.0");
    }

    #[test]
    fn test_venv_provisioner_reports_missing_base_python() {
        let provisioner = VenvProvisioner::new(Some(PathBuf::from("/nonexistent/python-for-pyexec")));
        let dir = tempfile::tempdir().unwrap();
        let err = provisioner.provision(&dir.path().join("venv")).unwrap_err();
        assert!(err.to_string().contains("No base Python interpreter found"));
    }
}
