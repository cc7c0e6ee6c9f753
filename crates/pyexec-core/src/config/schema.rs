//! Config structs grouped by concern, loaded from the environment.

use super::env_keys::{observability as obv_keys, sandbox as sandbox_keys};
use super::loader::{env_bool, env_optional, env_or};
use std::path::PathBuf;

/// Directory name of the default installation under the user's home.
pub const DEFAULT_ENV_DIR_NAME: &str = ".python_executor_sandbox";

/// Default script timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Isolated installation settings.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Root of the virtual environment.
    pub env_dir: PathBuf,
    /// Base interpreter for `-m venv`; `None` means search PATH.
    pub base_python: Option<PathBuf>,
    /// Script timeout used when the caller does not supply one.
    pub default_timeout_secs: u64,
}

impl SandboxConfig {
    /// Load from the environment (also reads `.env`).
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let env_dir = env_optional(sandbox_keys::PYEXEC_ENV_DIR, sandbox_keys::ENV_DIR_ALIASES)
            .map(PathBuf::from)
            .unwrap_or_else(default_env_dir);
        let base_python = env_optional(sandbox_keys::PYEXEC_PYTHON, &[]).map(PathBuf::from);
        let default_timeout_secs = env_optional(sandbox_keys::PYEXEC_TIMEOUT_SECS, &[])
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            env_dir,
            base_python,
            default_timeout_secs,
        }
    }

    /// Override the installation location (e.g. from `--env-dir`).
    pub fn with_env_dir(mut self, env_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = env_dir {
            self.env_dir = dir;
        }
        self
    }
}

/// `~/.python_executor_sandbox`, or `./.python_executor_sandbox` when there is no home.
pub fn default_env_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_ENV_DIR_NAME)
}

/// Observability: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::PYEXEC_QUIET, &[], false),
                log_level: env_or(obv_keys::PYEXEC_LOG_LEVEL, &[], || {
                    "pyexec=info,pyexec_sandbox=info,pyexec_core=info".to_string()
                }),
                log_json: env_bool(obv_keys::PYEXEC_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::PYEXEC_AUDIT_LOG, &[]),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_env_dir_is_hidden_home_subdir() {
        let dir = default_env_dir();
        assert_eq!(
            dir.file_name().and_then(|n| n.to_str()),
            Some(DEFAULT_ENV_DIR_NAME)
        );
    }

    #[test]
    fn test_with_env_dir_override() {
        let cfg = SandboxConfig {
            env_dir: PathBuf::from("/from/env"),
            base_python: None,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
        };
        let cfg = cfg.with_env_dir(None);
        assert_eq!(cfg.env_dir, PathBuf::from("/from/env"));
        let cfg = cfg.with_env_dir(Some(PathBuf::from("/from/cli")));
        assert_eq!(cfg.env_dir, PathBuf::from("/from/cli"));
    }
}
