// Standalone MCP server binary

use anyhow::{Context, Result};
use clap::Parser;
use nowbridge_mcp::{McpConfig, McpServer, ToolRegistry};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nowbridge-mcp")]
#[command(about = "ServiceNow tools for MCP clients, served over stdio", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "NOWBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Tool package to expose (overrides the configuration file)
    #[arg(short, long, env = "MCP_TOOL_PACKAGE")]
    package: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    tracing::info!("nowbridge MCP server starting");

    let mut config = McpConfig::load(args.config.as_deref())?;
    if args.package.is_some() {
        config.tools.package = args.package;
    }

    let ctx = config.tool_context()?;
    let registry = ToolRegistry::with_builtin_domains(ctx).context("Failed to register tools")?;

    tracing::info!(
        tools = registry.len(),
        package = config.tools.package.as_deref().unwrap_or("full"),
        write = config.capabilities.is_write_enabled(),
        scripting = config.capabilities.is_scripting_enabled(),
        now_assist = config.capabilities.is_now_assist_enabled(),
        atf = config.capabilities.is_atf_enabled(),
        "Registered tools"
    );

    let server = McpServer::new(registry, config.tools.package.clone());
    server.serve_stdio().await?;

    Ok(())
}
