//! Observability: tracing init and the JSONL audit log.
//!
//! Uses `config::ObservabilityConfig` for PYEXEC_QUIET, PYEXEC_LOG_LEVEL,
//! PYEXEC_LOG_JSON and PYEXEC_AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup.
///
/// Logs go to stderr: stdout belongs to command output and the MCP protocol.
/// `RUST_LOG` takes precedence over PYEXEC_LOG_LEVEL. With PYEXEC_QUIET=1 only
/// WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: execution_started (right before the interpreter is spawned)
pub fn audit_execution_started(env_dir: &str, code_len: usize, timeout_secs: f64) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": timestamp(),
            "event": "execution_started",
            "env_dir": env_dir,
            "code_len": code_len,
            "timeout_secs": timeout_secs,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: execution_completed (`timed_out` runs report exit code -1)
pub fn audit_execution_completed(
    env_dir: &str,
    exit_code: i32,
    duration_ms: u64,
    stdout_len: usize,
    timed_out: bool,
) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": timestamp(),
            "event": "execution_completed",
            "env_dir": env_dir,
            "exit_code": exit_code,
            "duration_ms": duration_ms,
            "stdout_len": stdout_len,
            "timed_out": timed_out,
            "success": exit_code == 0,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: packages_installed
pub fn audit_packages_installed(env_dir: &str, packages: &[String], success: bool) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": timestamp(),
            "event": "packages_installed",
            "env_dir": env_dir,
            "packages": packages,
            "success": success,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: environment_reset
pub fn audit_environment_reset(env_dir: &str, success: bool) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": timestamp(),
            "event": "environment_reset",
            "env_dir": env_dir,
            "success": success,
        });
        append_jsonl(&path, &record);
    }
}
