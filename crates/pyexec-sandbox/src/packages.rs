//! Install and list packages with the installation's own pip.
//!
//! Specifiers are passed through untouched: pip's validation and its
//! all-or-nothing resolution decide what a batch does.

use std::process::Command;
use std::time::Duration;

use pyexec_core::observability;

use crate::common::{
    run_with_timeout, WaitOutcome, PACKAGE_INSTALL_TIMEOUT_SECS, PACKAGE_LIST_TIMEOUT_SECS,
};
use crate::env::builder::Installation;
use crate::info_log;
use crate::result::ExecutionResult;
use crate::runner::INIT_FAILED_MESSAGE;

pub const NO_PACKAGES_MESSAGE: &str = "No packages specified";
pub const INSTALL_TIMEOUT_MESSAGE: &str = "Package installation timed out after 5 minutes";
pub const LIST_TIMEOUT_MESSAGE: &str = "Package listing timed out after 30 seconds";

/// Ordered batch of package specifiers (`name` or `name<constraint>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRequest {
    specifiers: Vec<String>,
}

impl PackageRequest {
    /// Build from specifiers; blank entries are dropped.
    pub fn new<I, S>(specifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            specifiers: specifiers
                .into_iter()
                .map(Into::into)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Split a whitespace-separated list, e.g. `"pandas>=2.0 numpy"`.
    pub fn parse(names: &str) -> Self {
        Self::new(names.split_whitespace())
    }

    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    pub fn specifiers(&self) -> &[String] {
        &self.specifiers
    }
}

fn pip(installation: &Installation) -> Command {
    let mut cmd = Command::new(installation.python_path());
    cmd.arg("-m").arg("pip");
    cmd
}

/// Install the whole request in one pip invocation (5 minute timeout).
pub fn install(installation: &mut Installation, request: &PackageRequest) -> ExecutionResult {
    if !installation.ensure_ready() {
        return ExecutionResult::failure(INIT_FAILED_MESSAGE);
    }
    if request.is_empty() {
        return ExecutionResult::failure(NO_PACKAGES_MESSAGE);
    }

    info_log!("Installing packages: {}", request.specifiers().join(" "));
    let mut cmd = pip(installation);
    cmd.arg("install")
        .arg("--disable-pip-version-check")
        .args(request.specifiers());

    let result = match run_with_timeout(&mut cmd, Duration::from_secs(PACKAGE_INSTALL_TIMEOUT_SECS)) {
        Ok(WaitOutcome::Exited {
            stdout,
            stderr,
            code,
        }) => ExecutionResult::from_exit(stdout, stderr, code),
        Ok(WaitOutcome::TimedOut) => {
            tracing::warn!("pip install timed out");
            ExecutionResult::failure(INSTALL_TIMEOUT_MESSAGE)
        }
        Err(e) => {
            tracing::error!(error = %e, "Unexpected error during package installation");
            ExecutionResult::failure(format!("System error: {}", e))
        }
    };

    observability::audit_packages_installed(
        &installation.location().to_string_lossy(),
        request.specifiers(),
        result.success,
    );
    result
}

/// `pip list --format=columns` (30 second timeout); output verbatim on stdout.
pub fn list_installed(installation: &mut Installation) -> ExecutionResult {
    if !installation.ensure_ready() {
        return ExecutionResult::failure(INIT_FAILED_MESSAGE);
    }

    let mut cmd = pip(installation);
    cmd.arg("list").arg("--format=columns");

    match run_with_timeout(&mut cmd, Duration::from_secs(PACKAGE_LIST_TIMEOUT_SECS)) {
        Ok(WaitOutcome::Exited {
            stdout,
            stderr,
            code,
        }) => ExecutionResult::from_exit(stdout, stderr, code),
        Ok(WaitOutcome::TimedOut) => ExecutionResult::failure(LIST_TIMEOUT_MESSAGE),
        Err(e) => {
            tracing::error!(error = %e, "Unexpected error while listing packages");
            ExecutionResult::failure(format!("System error: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pip_calls, FakeMode, FakeProvisioner};

    fn installation(mode: FakeMode) -> (tempfile::TempDir, Installation) {
        let dir = tempfile::tempdir().unwrap();
        let inst = Installation::new(
            dir.path().join("sandbox"),
            Box::new(FakeProvisioner::new(mode)),
        );
        (dir, inst)
    }

    #[test]
    fn test_request_parse() {
        let request = PackageRequest::parse("  pandas>=2.0 \n numpy\trequests==2.31.0 ");
        assert_eq!(request.specifiers(), ["pandas>=2.0", "numpy", "requests==2.31.0"]);
        assert!(PackageRequest::parse("   ").is_empty());
        assert!(PackageRequest::new(["", " "]).is_empty());
    }

    #[test]
    fn test_empty_request_spawns_nothing() {
        let (_dir, mut inst) = installation(FakeMode::Interpreter);
        let result = install(&mut inst, &PackageRequest::default());
        assert!(!result.success);
        assert_eq!(result.return_code, -1);
        assert_eq!(result.error_message.as_deref(), Some(NO_PACKAGES_MESSAGE));
        assert!(pip_calls(inst.location()).is_empty());
    }

    #[test]
    fn test_install_requires_readiness() {
        let (_dir, mut inst) = installation(FakeMode::Fail);
        let result = install(&mut inst, &PackageRequest::parse("numpy"));
        assert_eq!(result.error_message.as_deref(), Some(INIT_FAILED_MESSAGE));
        let result = list_installed(&mut inst);
        assert_eq!(result.error_message.as_deref(), Some(INIT_FAILED_MESSAGE));
    }

    #[cfg(unix)]
    #[test]
    fn test_install_passes_batch_in_one_invocation() {
        let (_dir, mut inst) = installation(FakeMode::Interpreter);
        let result = install(&mut inst, &PackageRequest::parse("pandas>=2.0 numpy"));
        assert!(result.success, "{result}");
        assert!(result.stdout.contains("Successfully installed pandas>=2.0 numpy"));
        assert_eq!(
            pip_calls(inst.location()),
            ["-m pip install --disable-pip-version-check pandas>=2.0 numpy"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_install_failure_maps_exit_code() {
        let (_dir, mut inst) = installation(FakeMode::Interpreter);
        let result = install(&mut inst, &PackageRequest::parse("numpy no-such-package-xyz"));
        assert!(!result.success);
        assert_eq!(result.return_code, 1);
        assert!(result.error_message.is_none());
        assert!(result.stderr.contains("No matching distribution"));
        assert_eq!(result.failure_detail(), result.stderr);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_installed_returns_output_verbatim() {
        let (_dir, mut inst) = installation(FakeMode::Interpreter);
        let result = list_installed(&mut inst);
        assert!(result.success, "{result}");
        assert!(result.stdout.starts_with("Package    Version\n"));
        assert!(result.stdout.contains("pip        24.0"));
        assert_eq!(pip_calls(inst.location()), ["-m pip list --format=columns"]);
    }
}
