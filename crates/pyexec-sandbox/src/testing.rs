//! Test doubles: a provisioner that lays down a fake interpreter.
//!
//! On Unix the fake `python` is a shell script: `python <file>` runs the file
//! with `/bin/sh`, `python -m pip ...` is answered from canned output and
//! logged to `<location>/pip-calls.log`, and `python --version` prints a
//! fixed version. Scripts in process tests are therefore shell code.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::env::builder::{python_path, Provisioner};

pub(crate) const PIP_CALLS_LOG: &str = "pip-calls.log";

#[cfg(unix)]
const FAKE_PYTHON: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "Python 3.12.0"
    exit 0
fi
if [ "$1" = "-m" ]; then
    echo "$*" >> "$(dirname "$0")/../pip-calls.log"
    shift 2
    case "$1" in
        install)
            shift 2
            for pkg in "$@"; do
                if [ "$pkg" = "no-such-package-xyz" ]; then
                    echo "ERROR: No matching distribution found for $pkg" >&2
                    exit 1
                fi
            done
            echo "Successfully installed $*"
            exit 0
            ;;
        list)
            echo "Package    Version"
            echo "---------- -------"
            echo "pip        24.0"
            exit 0
            ;;
    esac
    exit 2
fi
exec /bin/sh "$@"
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeMode {
    /// Create the location with a working fake interpreter.
    Interpreter,
    /// Create the location but no interpreter (corrupted install).
    NoInterpreter,
    /// Create a partial directory, then fail.
    Fail,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeProvisioner {
    pub calls: Arc<AtomicUsize>,
    mode: FakeMode,
}

impl FakeProvisioner {
    pub fn new(mode: FakeMode) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            mode,
        }
    }
}

impl Provisioner for FakeProvisioner {
    fn name(&self) -> &str {
        "fake"
    }

    fn provision(&self, location: &Path) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(location)?;
        match self.mode {
            FakeMode::Fail => anyhow::bail!("simulated provisioning failure"),
            FakeMode::NoInterpreter => Ok(()),
            FakeMode::Interpreter => write_fake_python(location),
        }
    }
}

fn write_fake_python(location: &Path) -> anyhow::Result<()> {
    let python = python_path(location);
    if let Some(parent) = python.parent() {
        std::fs::create_dir_all(parent)?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(&python, FAKE_PYTHON)?;
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    std::fs::write(&python, b"")?;
    Ok(())
}

/// Lines the fake interpreter logged for `-m pip` invocations.
pub(crate) fn pip_calls(location: &Path) -> Vec<String> {
    std::fs::read_to_string(location.join(PIP_CALLS_LOG))
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
