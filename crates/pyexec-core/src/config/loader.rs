//! Environment variable loading with fallback chains.

use std::env;
use std::path::Path;

/// Load `.env` from the current directory into the process environment.
/// Existing variables are never overridden. Runs once per process.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Load `<dir>/.env` into the process environment without overriding existing variables.
pub fn load_dotenv_from_dir(dir: &Path) {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return;
    };
    for (key, value) in content.lines().filter_map(parse_dotenv_line) {
        if env::var(&key).is_err() {
            env::set_var(key, value);
        }
    }
}

/// Parse one `KEY=VALUE` line. Blank lines and `#` comments yield `None`.
/// Surrounding quotes are stripped; an unquoted trailing `# comment` is dropped.
pub(crate) fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim().trim_start_matches("export ").trim();
    let mut value = value.trim();
    if let Some(hash_pos) = value.find('#') {
        let before_hash = value[..hash_pos].trim_end();
        if !before_hash.contains('"') && !before_hash.contains('\'') {
            value = before_hash;
        }
    }
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

/// Read the primary variable or the first set alias; fall back to `default`.
/// Empty values count as unset.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// Read the primary variable or the first set alias (empty values count as unset).
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    match env_optional(primary, aliases) {
        Some(s) => parse_bool(&s),
        None => default,
    }
}

fn parse_bool(s: &str) -> bool {
    !matches!(
        s.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_line() {
        assert_eq!(
            parse_dotenv_line("PYEXEC_ENV_DIR=/tmp/venv"),
            Some(("PYEXEC_ENV_DIR".to_string(), "/tmp/venv".to_string()))
        );
        assert_eq!(
            parse_dotenv_line("export KEY=\"quoted value\""),
            Some(("KEY".to_string(), "quoted value".to_string()))
        );
        assert_eq!(
            parse_dotenv_line("KEY=value # trailing"),
            Some(("KEY".to_string(), "value".to_string()))
        );
        assert_eq!(parse_dotenv_line("# comment"), None);
        assert_eq!(parse_dotenv_line("   "), None);
        assert_eq!(parse_dotenv_line("no_equals_sign"), None);
    }

    #[test]
    fn test_parse_bool() {
        for falsy in ["0", "false", "No", "OFF"] {
            assert!(!parse_bool(falsy), "{falsy} should be false");
        }
        for truthy in ["1", "true", "yes", "anything"] {
            assert!(parse_bool(truthy), "{truthy} should be true");
        }
    }

    #[test]
    fn test_env_optional_alias_and_empty() {
        env::set_var("PYEXEC_TEST_LOADER_PRIMARY", "   ");
        env::set_var("PYEXEC_TEST_LOADER_ALIAS", "from-alias");
        // A blank primary falls through to nothing, not to the alias.
        assert_eq!(env_optional("PYEXEC_TEST_LOADER_PRIMARY", &[]), None);
        assert_eq!(
            env_optional("PYEXEC_TEST_LOADER_MISSING", &["PYEXEC_TEST_LOADER_ALIAS"]),
            Some("from-alias".to_string())
        );
        assert_eq!(
            env_or("PYEXEC_TEST_LOADER_MISSING", &[], || "default".to_string()),
            "default"
        );
        env::remove_var("PYEXEC_TEST_LOADER_PRIMARY");
        env::remove_var("PYEXEC_TEST_LOADER_ALIAS");
    }

    #[test]
    fn test_load_dotenv_does_not_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "PYEXEC_TEST_DOTENV_NEW=fresh\nPYEXEC_TEST_DOTENV_SET=from-file\n",
        )
        .unwrap();
        env::set_var("PYEXEC_TEST_DOTENV_SET", "from-env");
        load_dotenv_from_dir(dir.path());
        assert_eq!(env::var("PYEXEC_TEST_DOTENV_NEW").unwrap(), "fresh");
        assert_eq!(env::var("PYEXEC_TEST_DOTENV_SET").unwrap(), "from-env");
        env::remove_var("PYEXEC_TEST_DOTENV_NEW");
        env::remove_var("PYEXEC_TEST_DOTENV_SET");
    }
}
