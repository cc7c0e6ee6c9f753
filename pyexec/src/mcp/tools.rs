//! MCP tool definitions: the 5 tools exposed by the MCP server.

use serde_json::{json, Value};

/// Return the 5 MCP tool definitions.
pub(super) fn get_mcp_tools() -> Vec<Value> {
    vec![
        json!({
            "name": "execute_python",
            "description": "Execute Python code in an isolated sandbox environment. The code runs in a dedicated virtual environment with its own installed packages. Use install_package to add dependencies. Returns stdout, plus stderr under a [STDERR]: marker.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "The complete Python code to execute"
                    },
                    "timeout": {
                        "type": "integer",
                        "default": 60,
                        "minimum": 1,
                        "maximum": 300,
                        "description": "Maximum execution time in seconds (default: 60, max: 300)"
                    }
                },
                "required": ["code"]
            }
        }),
        json!({
            "name": "install_package",
            "description": "Install Python packages into the sandbox environment with pip. Packages persist across executions until the environment is reset.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package_names": {
                        "type": "string",
                        "description": "Space-separated list of packages; version specifiers allowed (e.g. \"pandas>=2.0 numpy\")"
                    }
                },
                "required": ["package_names"]
            }
        }),
        json!({
            "name": "list_installed_packages",
            "description": "List all packages installed in the sandbox environment with their versions.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "required": []
            }
        }),
        json!({
            "name": "reset_sandbox",
            "description": "Reset the sandbox environment to a clean state. Removes all installed packages. Use this if the environment is corrupted or to start fresh.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "required": []
            }
        }),
        json!({
            "name": "get_sandbox_info",
            "description": "Get information about the sandbox environment: Python version, environment location and status.",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "required": []
            }
        }),
    ]
}
