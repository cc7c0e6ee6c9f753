//! MCP request handlers: initialize and the five tool calls.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

use pyexec_sandbox::{ExecutionResult, PackageRequest, Sandbox};

use crate::cli::clamp_timeout_secs;

const DEFAULT_TOOL_TIMEOUT_SECS: i64 = 60;

/// Text content of one tool call plus the MCP `isError` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub(super) fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub(super) fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Rendered with the shared `ExecutionResult` rendering rule.
    fn rendered(result: &ExecutionResult) -> Self {
        Self {
            text: result.to_string(),
            is_error: !result.success,
        }
    }
}

/// Handle the `initialize` request.
pub(super) fn handle_initialize(_params: &Value) -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {}
        },
        "serverInfo": {
            "name": "pyexec-mcp-server",
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "Execute Python code safely in an isolated sandbox environment"
    })
}

fn required_str<'a>(arguments: &'a Value, name: &str) -> Result<&'a str> {
    arguments
        .get(name)
        .and_then(|v| v.as_str())
        .with_context(|| format!("Missing required argument: {}", name))
}

/// Handle the `execute_python` tool call.
pub(super) fn handle_execute_python(sandbox: &Sandbox, arguments: &Value) -> Result<ToolOutput> {
    let code = required_str(arguments, "code")?;
    let requested = arguments
        .get("timeout")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS);
    let timeout = clamp_timeout_secs(requested);

    tracing::info!("Executing Python code (timeout: {}s)", timeout);
    let result = sandbox.execute(code, Some(Duration::from_secs(timeout)));
    Ok(ToolOutput::rendered(&result))
}

/// Handle the `install_package` tool call.
pub(super) fn handle_install_package(sandbox: &Sandbox, arguments: &Value) -> Result<ToolOutput> {
    let package_names = required_str(arguments, "package_names")?;
    let request = PackageRequest::parse(package_names);
    if request.is_empty() {
        return Ok(ToolOutput::error("Error: No package names provided"));
    }

    tracing::info!("Installing packages: {:?}", request.specifiers());
    let result = sandbox.install(&request);
    if result.success {
        Ok(ToolOutput::ok(format!(
            "Successfully installed: {}\n\n{}",
            package_names, result.stdout
        )))
    } else {
        Ok(ToolOutput::error(format!(
            "Installation failed:\n{}",
            result.failure_detail()
        )))
    }
}

/// Handle the `list_installed_packages` tool call.
pub(super) fn handle_list_installed_packages(sandbox: &Sandbox) -> Result<ToolOutput> {
    tracing::info!("Listing installed packages");
    let result = sandbox.list_installed();
    if !result.success {
        return Ok(ToolOutput::error(format!("Error: {}", result.failure_detail())));
    }
    if result.stdout.trim().is_empty() {
        return Ok(ToolOutput::ok("No packages installed (besides defaults)."));
    }
    Ok(ToolOutput::ok(result.stdout))
}

/// Handle the `reset_sandbox` tool call.
pub(super) fn handle_reset_sandbox(sandbox: &Sandbox) -> Result<ToolOutput> {
    tracing::info!("Resetting sandbox environment");
    Ok(ToolOutput::rendered(&sandbox.reset()))
}

/// Handle the `get_sandbox_info` tool call.
pub(super) fn handle_get_sandbox_info(sandbox: &Sandbox) -> Result<ToolOutput> {
    Ok(ToolOutput::ok(sandbox.info().to_string()))
}
