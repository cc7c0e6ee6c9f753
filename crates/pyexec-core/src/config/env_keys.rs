//! Environment variable key constants.

/// Isolated installation
pub mod sandbox {
    /// Location of the virtual environment (default `~/.python_executor_sandbox`)
    pub const PYEXEC_ENV_DIR: &str = "PYEXEC_ENV_DIR";
    pub const ENV_DIR_ALIASES: &[&str] = &["PYTHON_EXECUTOR_SANDBOX"];

    /// Base interpreter used to create the venv (default: `python3`, then `python` on PATH)
    pub const PYEXEC_PYTHON: &str = "PYEXEC_PYTHON";

    /// Default script timeout in seconds when the caller does not pass one
    pub const PYEXEC_TIMEOUT_SECS: &str = "PYEXEC_TIMEOUT_SECS";
}

/// Observability and logging
pub mod observability {
    pub const PYEXEC_QUIET: &str = "PYEXEC_QUIET";
    pub const PYEXEC_LOG_LEVEL: &str = "PYEXEC_LOG_LEVEL";
    pub const PYEXEC_LOG_JSON: &str = "PYEXEC_LOG_JSON";
    pub const PYEXEC_AUDIT_LOG: &str = "PYEXEC_AUDIT_LOG";
}
