use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lowest timeout a caller may request, in seconds
pub const MIN_TIMEOUT_SECS: i64 = 1;
/// Highest timeout a caller may request, in seconds
pub const MAX_TIMEOUT_SECS: i64 = 300;

/// Clamp a caller-chosen script timeout into [MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS].
pub fn clamp_timeout_secs(requested: i64) -> u64 {
    requested.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS) as u64
}

/// `--timeout` if given, else the configured default; both clamped.
pub fn effective_timeout_secs(requested: Option<i64>, configured: u64) -> u64 {
    let secs = requested.unwrap_or_else(|| i64::try_from(configured).unwrap_or(i64::MAX));
    clamp_timeout_secs(secs)
}

/// pyexec - run Python code in an isolated virtual environment
#[derive(Parser, Debug)]
#[command(name = "pyexec")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Sandbox environment directory (default: $PYEXEC_ENV_DIR or ~/.python_executor_sandbox)
    #[arg(long, global = true, value_name = "DIR")]
    pub env_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a Python script in the sandbox
    ///
    /// Examples:
    ///   pyexec run script.py
    ///   echo 'print(2 + 2)' | pyexec run -
    ///   pyexec run -c 'import math; print(math.pi)' --timeout 10
    Run {
        /// Script file, or "-" to read the script from stdin
        #[arg(value_name = "SCRIPT", required_unless_present = "code")]
        script: Option<String>,

        /// Inline code instead of a script file
        #[arg(short = 'c', long, conflicts_with = "script")]
        code: Option<String>,

        /// Execution timeout in seconds, clamped to 1..=300 (default: from env or 60)
        #[arg(long)]
        timeout: Option<i64>,

        /// Print the full result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Install packages into the sandbox (pip specifiers, e.g. "pandas>=2.0")
    Install {
        #[arg(value_name = "PACKAGE", required = true)]
        packages: Vec<String>,
    },

    /// List packages installed in the sandbox
    List,

    /// Delete the sandbox environment and recreate it
    Reset,

    /// Show Python version, environment path and status
    Info {
        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run MCP (Model Context Protocol) server over stdio
    ///
    /// Provides 5 tools: execute_python, install_package,
    /// list_installed_packages, reset_sandbox, get_sandbox_info.
    #[command(name = "mcp")]
    Mcp,
}
