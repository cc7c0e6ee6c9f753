mod cli;
mod mcp;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;

use cli::{effective_timeout_secs, Cli, Commands};
use pyexec_core::config::SandboxConfig;
use pyexec_core::observability;
use pyexec_sandbox::{ExecutionResult, PackageRequest, Sandbox};

fn main() -> Result<ExitCode> {
    observability::init_tracing();
    let cli = Cli::parse();

    let config = SandboxConfig::from_env().with_env_dir(cli.env_dir);
    let sandbox = Sandbox::from_config(&config);
    tracing::debug!(env_dir = %sandbox.location().display(), "Sandbox configured");

    match cli.command {
        Commands::Run {
            script,
            code,
            timeout,
            json,
        } => {
            let code = match (code, script) {
                (Some(code), _) => code,
                (None, Some(script)) => read_script(&script)?,
                (None, None) => anyhow::bail!("Either SCRIPT or --code is required"),
            };
            let timeout_secs = effective_timeout_secs(timeout, config.default_timeout_secs);
            tracing::info!("Executing Python code (timeout: {}s)", timeout_secs);
            let result = sandbox.execute(&code, Some(Duration::from_secs(timeout_secs)));
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result);
            }
            Ok(exit_code(&result))
        }
        Commands::Install { packages } => {
            let request = PackageRequest::new(packages);
            let result = sandbox.install(&request);
            println!("{}", result);
            Ok(exit_code(&result))
        }
        Commands::List => {
            let result = sandbox.list_installed();
            println!("{}", result);
            Ok(exit_code(&result))
        }
        Commands::Reset => {
            let result = sandbox.reset();
            println!("{}", result);
            Ok(exit_code(&result))
        }
        Commands::Info { json } => {
            let info = sandbox.info();
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!("{}", info);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mcp => {
            tracing::info!("Starting MCP server with stdio transport");
            mcp::serve_mcp_stdio(&sandbox)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Read a script from a file, or from stdin when `path` is "-".
fn read_script(path: &str) -> Result<String> {
    if path == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context("Read script from stdin")?;
        return Ok(s);
    }
    std::fs::read_to_string(path).with_context(|| format!("Read script {}", path))
}

fn exit_code(result: &ExecutionResult) -> ExitCode {
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
