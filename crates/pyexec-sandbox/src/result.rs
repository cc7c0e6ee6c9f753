//! The outcome value shared by every sandbox operation.

use serde::Serialize;
use std::fmt;

/// Rendered when a run produced neither stdout nor stderr.
pub const NO_OUTPUT_MESSAGE: &str = "Code executed successfully (no output).";

/// Marker line that introduces captured stderr in the rendering.
pub const STDERR_MARKER: &str = "[STDERR]:";

/// Result of one execution, installation, listing or reset.
///
/// `error_message` is set only when the operation failed before a process could
/// produce meaningful output (initialization failure, timeout, invalid request,
/// system fault). A script that ran and exited non-zero has `success == false`,
/// its captured streams and exit code, and no `error_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// A process ran to completion; success is derived from the exit code.
    pub fn from_exit(stdout: String, stderr: String, return_code: i32) -> Self {
        Self {
            success: return_code == 0,
            stdout,
            stderr,
            return_code,
            error_message: None,
        }
    }

    /// Successful operation that reports a fixed message on stdout.
    pub fn ok_message(message: impl Into<String>) -> Self {
        Self::from_exit(message.into(), String::new(), 0)
    }

    /// Failure before any meaningful process output: empty streams, code -1.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            return_code: -1,
            error_message: Some(message.into()),
        }
    }

    /// Text for callers that only read one of the failure channels.
    pub fn failure_detail(&self) -> &str {
        self.error_message.as_deref().unwrap_or(&self.stderr)
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref message) = self.error_message {
            return write!(f, "Error: {}", message);
        }

        let mut parts: Vec<String> = Vec::new();
        if !self.stdout.trim().is_empty() {
            parts.push(self.stdout.clone());
        }
        if !self.stderr.trim().is_empty() {
            parts.push(format!("{}\n{}", STDERR_MARKER, self.stderr));
        }

        if parts.is_empty() {
            return f.write_str(NO_OUTPUT_MESSAGE);
        }
        f.write_str(&parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_output() {
        let result = ExecutionResult::from_exit("Hello, World!".into(), String::new(), 0);
        assert!(result.success);
        assert_eq!(result.to_string(), "Hello, World!");
    }

    #[test]
    fn test_success_no_output() {
        let result = ExecutionResult::from_exit("  \n".into(), "\t".into(), 0);
        assert_eq!(result.to_string(), NO_OUTPUT_MESSAGE);
        assert!(result.to_string().to_lowercase().contains("successfully"));
    }

    #[test]
    fn test_stdout_then_stderr_in_order() {
        let result = ExecutionResult::from_exit("x".into(), "y".into(), 0);
        let rendered = result.to_string();
        let x = rendered.find('x').unwrap();
        let marker = rendered.find(STDERR_MARKER).unwrap();
        let y = rendered.rfind('y').unwrap();
        assert!(x < marker && marker < y, "unexpected order: {rendered}");
        assert_eq!(rendered, "x\n[STDERR]:\ny");
    }

    #[test]
    fn test_stderr_only() {
        let result = ExecutionResult::from_exit(String::new(), "warning message".into(), 1);
        assert!(!result.success);
        assert_eq!(result.to_string(), "[STDERR]:\nwarning message");
    }

    #[test]
    fn test_error_message_wins() {
        let mut result = ExecutionResult::failure("Something went wrong");
        result.stdout = "ignored".into();
        assert_eq!(result.to_string(), "Error: Something went wrong");
        assert_eq!(result.return_code, -1);
        assert!(!result.success);
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error_message() {
        let result = ExecutionResult::from_exit(String::new(), "Traceback".into(), 1);
        assert!(!result.success);
        assert!(result.error_message.is_none());
        assert_eq!(result.failure_detail(), "Traceback");
    }

    #[test]
    fn test_serializes_all_fields() {
        let result = ExecutionResult::failure("boom");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["return_code"], -1);
        assert_eq!(value["error_message"], "boom");
    }
}
