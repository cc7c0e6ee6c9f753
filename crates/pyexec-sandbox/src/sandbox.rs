//! `Sandbox`: the single handle callers hold on one isolated installation.
//!
//! Every operation takes the installation lock for its full duration,
//! including the spawned process, so concurrent callers are serialized and
//! never race on the venv or its package database.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pyexec_core::config::SandboxConfig;
use serde::Serialize;

use crate::common::DEFAULT_TIMEOUT_SECS;
use crate::env::builder::{self, Installation, Provisioner, VenvProvisioner};
use crate::packages::{self, PackageRequest};
use crate::result::ExecutionResult;
use crate::runner;

/// Metadata reported by [`Sandbox::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxInfo {
    pub python_version: String,
    pub env_path: PathBuf,
    /// Interpreter and pip inside the installation (JSON output only).
    pub python_path: PathBuf,
    pub pip_path: PathBuf,
    pub initialized: bool,
}

impl fmt::Display for SandboxInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.initialized {
            "Initialized"
        } else {
            "Not initialized (will be created on first use)"
        };
        writeln!(f, "Sandbox Environment Info:")?;
        writeln!(f, "- Python Version: {}", self.python_version)?;
        writeln!(f, "- Environment Path: {}", self.env_path.display())?;
        writeln!(f, "- Status: {}", status)
    }
}

#[derive(Debug)]
pub struct Sandbox {
    location: PathBuf,
    default_timeout: Duration,
    installation: Mutex<Installation>,
}

impl Sandbox {
    /// Sandbox at `location`, created with `python -m venv` on first use.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self::with_provisioner(location, Box::new(VenvProvisioner::default()))
    }

    /// Location, base interpreter and default timeout from configuration.
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::with_provisioner(
            config.env_dir.clone(),
            Box::new(VenvProvisioner::new(config.base_python.clone())),
        )
        .with_default_timeout(Duration::from_secs(config.default_timeout_secs))
    }

    pub fn with_provisioner(location: impl Into<PathBuf>, provisioner: Box<dyn Provisioner>) -> Self {
        let location = location.into();
        Self {
            installation: Mutex::new(Installation::new(location.clone(), provisioner)),
            location,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// A panic while the lock was held leaves nothing half-written in
    /// `Installation` that `ensure_ready` would not re-verify, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Installation> {
        self.installation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn python_path(&self) -> PathBuf {
        builder::python_path(&self.location)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Cached readiness flag (no filesystem access, no creation).
    pub fn is_ready(&self) -> bool {
        self.lock().is_ready()
    }

    /// Create the installation if needed; `false` when it is unusable.
    pub fn ensure_ready(&self) -> bool {
        self.lock().ensure_ready()
    }

    /// Run `code`; `None` uses the default timeout.
    pub fn execute(&self, code: &str, timeout: Option<Duration>) -> ExecutionResult {
        let timeout = timeout.unwrap_or(self.default_timeout);
        runner::execute(&mut self.lock(), code, timeout)
    }

    pub fn install(&self, request: &PackageRequest) -> ExecutionResult {
        packages::install(&mut self.lock(), request)
    }

    pub fn list_installed(&self) -> ExecutionResult {
        packages::list_installed(&mut self.lock())
    }

    pub fn reset(&self) -> ExecutionResult {
        self.lock().reset()
    }

    /// Interpreter version, location and readiness. Creates the installation
    /// if it does not exist yet.
    pub fn info(&self) -> SandboxInfo {
        let mut installation = self.lock();
        let python_version = installation.python_version();
        SandboxInfo {
            python_version,
            env_path: installation.location().to_path_buf(),
            python_path: installation.python_path(),
            pip_path: installation.pip_path(),
            initialized: installation.is_ready(),
        }
    }
}
