//! MCP (Model Context Protocol) server over stdio.
//!
//! JSON-RPC 2.0, one message per line. Provides 5 tools: execute_python,
//! install_package, list_installed_packages, reset_sandbox, get_sandbox_info.
//!
//! Protocol flow:
//!   1. Client sends `initialize` → Server returns capabilities
//!   2. Client sends `notifications/initialized`
//!   3. Client sends `tools/list` → Server returns 5 tool definitions
//!   4. Client sends `tools/call` → Server runs the tool, returns text content
//!
//! Logging goes to stderr; stdout carries protocol messages only.

mod handlers;
mod tools;

use anyhow::Result;
use serde_json::{json, Value};
use std::io::{self, BufRead, BufReader, Write};

use pyexec_sandbox::Sandbox;

use handlers::{
    handle_execute_python, handle_get_sandbox_info, handle_initialize, handle_install_package,
    handle_list_installed_packages, handle_reset_sandbox, ToolOutput,
};
use tools::get_mcp_tools;

/// Maximum JSON-RPC request size (10 MB).
const MAX_REQUEST_SIZE: usize = 10 * 1024 * 1024;

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;

// ═══════════════════════════════════════════════════════════════════════════════
// Size-Limited Line Reader
// ═══════════════════════════════════════════════════════════════════════════════

/// Read a single line from `reader`, enforcing [`MAX_REQUEST_SIZE`].
/// Returns `Ok(None)` on EOF, `Ok(Some(line))` on success.
/// Oversized lines are skipped (bytes discarded) and an error is returned.
fn read_line_limited(reader: &mut impl BufRead, limit: usize) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return if buf.is_empty() {
                Ok(None)
            } else {
                finish_line(buf).map(Some)
            };
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if buf.len() + pos > limit {
                    reader.consume(pos + 1);
                    return Err(oversized(limit));
                }
                buf.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                return finish_line(buf).map(Some);
            }
            None => {
                let len = available.len();
                if buf.len() + len > limit {
                    reader.consume(len);
                    skip_until_newline(reader);
                    return Err(oversized(limit));
                }
                buf.extend_from_slice(available);
                reader.consume(len);
            }
        }
    }
}

fn finish_line(mut buf: Vec<u8>) -> io::Result<String> {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid UTF-8"))
}

fn oversized(limit: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Request exceeds {} byte size limit", limit),
    )
}

/// Discard bytes from `reader` until a newline or EOF.
fn skip_until_newline(reader: &mut impl BufRead) {
    loop {
        match reader.fill_buf() {
            Ok([]) => break,
            Ok(b) => {
                if let Some(pos) = b.iter().position(|&c| c == b'\n') {
                    reader.consume(pos + 1);
                    break;
                }
                let len = b.len();
                reader.consume(len);
            }
            Err(_) => break,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MCP Protocol: Main Server Loop
// ═══════════════════════════════════════════════════════════════════════════════

/// Run the MCP server over stdio until EOF.
///
/// This is the entry point for `pyexec mcp`.
pub fn serve_mcp_stdio(sandbox: &Sandbox) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();
    serve(sandbox, &mut reader, &mut writer)
}

fn serve(sandbox: &Sandbox, reader: &mut impl BufRead, writer: &mut impl Write) -> Result<()> {
    loop {
        let line = match read_line_limited(reader, MAX_REQUEST_SIZE) {
            Ok(None) => break,
            Ok(Some(l)) => l,
            Err(e) => {
                let message = format!("Request size error: {}", e);
                write_message(writer, &error_response(Value::Null, INVALID_REQUEST, message))?;
                continue;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                let message = format!("Parse error: {}", e);
                write_message(writer, &error_response(Value::Null, PARSE_ERROR, message))?;
                continue;
            }
        };

        if let Some(response) = handle_request(sandbox, &request) {
            write_message(writer, &response)?;
        }
    }

    tracing::info!("MCP client closed stdin, shutting down");
    Ok(())
}

/// Dispatch one request. Notifications yield `None`.
fn handle_request(sandbox: &Sandbox, request: &Value) -> Option<Value> {
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let params = request.get("params").cloned().unwrap_or(json!({}));
    tracing::debug!(method, "MCP request");

    let result = match method {
        // ─── Lifecycle ──────────────────────────────────────────────
        "initialize" => handle_initialize(&params),
        // Notification, no response required
        "notifications/initialized" | "initialized" => return None,
        "ping" => json!({}),

        // ─── Tools ─────────────────────────────────────────────────
        "tools/list" => json!({ "tools": get_mcp_tools() }),
        "tools/call" => {
            let output = call_tool(sandbox, &params);
            json!({
                "content": [{"type": "text", "text": output.text}],
                "isError": output.is_error
            })
        }

        // ─── Resources / Prompts (not provided) ─────────────────────
        "resources/list" => json!({"resources": []}),
        "prompts/list" => json!({"prompts": []}),

        // ─── Unknown ────────────────────────────────────────────────
        // Notifications (no id) are silently ignored
        _ => {
            return id.map(|id| {
                error_response(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
            });
        }
    };

    Some(json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "result": result
    }))
}

fn call_tool(sandbox: &Sandbox, params: &Value) -> ToolOutput {
    let tool_name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    let output = match tool_name {
        "execute_python" => handle_execute_python(sandbox, &arguments),
        "install_package" => handle_install_package(sandbox, &arguments),
        "list_installed_packages" => handle_list_installed_packages(sandbox),
        "reset_sandbox" => handle_reset_sandbox(sandbox),
        "get_sandbox_info" => handle_get_sandbox_info(sandbox),
        _ => Err(anyhow::anyhow!("Unknown tool: {}", tool_name)),
    };

    output.unwrap_or_else(|e| ToolOutput::error(format!("Error: {}", e)))
}

fn error_response(id: Value, code: i64, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}

/// Write one JSON-RPC message as a single line.
fn write_message(writer: &mut impl Write, message: &Value) -> Result<()> {
    writeln!(writer, "{}", message)?;
    writer.flush()?;
    Ok(())
}
