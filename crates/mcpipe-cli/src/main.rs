//! mcpipe: run the MCP handshake against a stdio server and print what it says.

use anyhow::{Context, Result, bail};
use clap::Parser;
use mcpipe_config::{CliOverrides, McpipeConfig};
use mcpipe_mcp::{McpSession, StderrMode, parse_tool_catalog, parse_tool_result};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mcpipe",
    version,
    about = "Talk to an MCP server over stdio: initialize, list tools, call tools"
)]
struct Cli {
    /// Config file to use instead of ./mcpipe.toml and ~/.mcpipe/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server command (arguments go after `--`)
    #[arg(long)]
    command: Option<String>,

    /// Arguments for the server command
    #[arg(last = true)]
    server_args: Vec<String>,

    /// Tool to call after listing; repeat for several calls
    #[arg(long = "tool")]
    tools: Vec<String>,

    /// JSON arguments for the matching --tool (defaults to {})
    #[arg(long = "arguments")]
    arguments: Vec<String>,

    /// What to do with the server's stderr: null or inherit
    #[arg(long)]
    stderr: Option<StderrMode>,

    /// Give up on a reply after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Fail when a response id does not match its request
    #[arg(long)]
    strict_ids: bool,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

/// One scheduled `tools/call`.
#[derive(Debug, PartialEq)]
struct ToolCall {
    name: String,
    arguments: serde_json::Value,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let calls = tool_calls(&cli.tools, &cli.arguments)?;

    if cli.command.is_none() && !cli.server_args.is_empty() {
        bail!("server arguments after `--` need --command");
    }

    let config = McpipeConfig::load(CliOverrides {
        config_path: cli.config,
        command: cli.command,
        args: cli.server_args,
        stderr: cli.stderr,
        timeout_ms: cli.timeout_ms,
        strict_ids: cli.strict_ids,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut session = McpSession::spawn(&config.server, config.client.clone())
        .context("Failed to start MCP server")?;
    eprintln!(
        "mcpipe v{} (server: {}, pid: {})",
        env!("CARGO_PKG_VERSION"),
        config.server.command_line(),
        session
            .server_pid()
            .map_or_else(|| "?".to_string(), |pid| pid.to_string())
    );

    let outcome = run_script(&mut session, &calls).await;

    match session.cleanup().await {
        Ok(Some(status)) => tracing::debug!("Server exited: {status}"),
        Ok(None) => {}
        Err(e) => tracing::warn!("Failed to clean up MCP server: {e}"),
    }

    outcome
}

/// initialize → initialized → tools/list → tools/call for each scheduled call.
async fn run_script(session: &mut McpSession, calls: &[ToolCall]) -> Result<()> {
    eprintln!("Sending initialize request...");
    let init = session
        .initialize_connection()
        .await
        .context("initialize failed")?;
    print_json("initialize", &init)?;

    eprintln!("Requesting available tools...");
    let tools = session.list_tools().await.context("tools/list failed")?;
    print_json("tools/list", &tools)?;
    match parse_tool_catalog(&tools) {
        Ok(catalog) => {
            for tool in &catalog {
                eprintln!("  {} - {}", tool.name, first_line(&tool.description));
            }
        }
        Err(e) => tracing::warn!("Could not read tool catalog: {e}"),
    }

    for call in calls {
        eprintln!("Calling tool: {}", call.name);
        let response = session
            .call_tool(&call.name, call.arguments.clone())
            .await
            .with_context(|| format!("tools/call '{}' failed", call.name))?;
        print_json("tools/call", &response)?;
        if let Ok(result) = parse_tool_result(&response) {
            if result.is_error {
                eprintln!("Tool '{}' reported an error", call.name);
            }
        }
    }

    Ok(())
}

/// Pair each `--tool` with its `--arguments`. With no `--tool` at all, call
/// `get_alerts` for Texas.
fn tool_calls(names: &[String], arguments: &[String]) -> Result<Vec<ToolCall>> {
    if names.is_empty() {
        if !arguments.is_empty() {
            bail!("--arguments given without --tool");
        }
        return Ok(vec![ToolCall {
            name: "get_alerts".to_string(),
            arguments: serde_json::json!({"state": "TX"}),
        }]);
    }
    if arguments.len() > names.len() {
        bail!("more --arguments than --tool flags");
    }

    names
        .iter()
        .enumerate()
        .map(|(i, name)| -> Result<ToolCall> {
            let arguments = match arguments.get(i) {
                Some(raw) => serde_json::from_str(raw)
                    .with_context(|| format!("--arguments for '{name}' is not valid JSON"))?,
                None => serde_json::json!({}),
            };
            if !arguments.is_object() {
                bail!("--arguments for '{name}' must be a JSON object");
            }
            Ok(ToolCall {
                name: name.clone(),
                arguments,
            })
        })
        .collect()
}

fn print_json(label: &str, value: &serde_json::Value) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value)?;
    println!("# {label}\n{pretty}");
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}
