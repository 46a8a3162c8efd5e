// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use otto_channels::CliAdapter;
use otto_config::{LogFormat, Settings};
use otto_core::Agent;
use otto_mcp::{McpServerConfig, McpTransportConfig};
use otto_skills::{SkillRegistry, SkillSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = otto_config::load(cli.config.as_deref()).context("loading settings")?;
    init_logging(&settings, cli.verbose);
    let settings = otto_config::init_global(settings).context("installing settings")?;

    let mcp_servers = parse_mcp_servers(&cli.mcp_servers)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_interactive(settings, mcp_servers).await,
        Commands::Submit { text, timeout } => {
            submit_once(settings, mcp_servers, text, timeout).await
        }
        Commands::ShowConfig => {
            println!(
                "{}",
                serde_yaml::to_string(settings.as_ref()).unwrap_or_default()
            );
            Ok(())
        }
        Commands::ListTools => list_tools(settings, mcp_servers).await,
        Commands::ListSkills => list_skills(&settings),
    }
}

/// Logging level and format come from settings; `RUST_LOG` still overrides
/// for ad-hoc debugging.
fn init_logging(settings: &Settings, verbose: bool) {
    let default_filter = if verbose {
        "debug"
    } else {
        settings.log_level.as_filter()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match settings.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Line => builder.compact().init(),
    }
}

/// Parse repeated `NAME=COMMAND [ARGS...]` flags into server configs.
fn parse_mcp_servers(flags: &[String]) -> anyhow::Result<Vec<McpServerConfig>> {
    let mut servers = Vec::with_capacity(flags.len());
    for flag in flags {
        let (name, command_line) = flag
            .split_once('=')
            .with_context(|| format!("--mcp-server {flag:?} is not NAME=COMMAND"))?;
        let mut words = command_line.split_whitespace();
        let command = words
            .next()
            .with_context(|| format!("--mcp-server {flag:?} has an empty command"))?;
        servers.push(McpServerConfig {
            name: name.to_string(),
            transport: McpTransportConfig::Stdio {
                command: command.to_string(),
                args: words.map(String::from).collect(),
            },
        });
    }
    Ok(servers)
}

async fn build_agent(
    settings: Arc<Settings>,
    mcp_servers: Vec<McpServerConfig>,
) -> anyhow::Result<Agent> {
    let agent = Agent::new(settings)?;
    if !mcp_servers.is_empty() {
        let imported = otto_mcp::import_servers(agent.tool_registry(), &mcp_servers).await;
        info!(imported, "MCP tools loaded");
    }
    Ok(agent)
}

async fn run_interactive(
    settings: Arc<Settings>,
    mcp_servers: Vec<McpServerConfig>,
) -> anyhow::Result<()> {
    let agent = build_agent(settings, mcp_servers).await?;
    agent.register_adapter(Arc::new(CliAdapter::default()));
    agent.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    agent.stop().await;
    Ok(())
}

async fn submit_once(
    settings: Arc<Settings>,
    mcp_servers: Vec<McpServerConfig>,
    text: String,
    timeout: u64,
) -> anyhow::Result<()> {
    let agent = build_agent(settings, mcp_servers).await?;
    agent.start().await;

    let task_id = agent.submit(text).await?;
    let handle = agent
        .wait_for_task(&task_id, Duration::from_secs(timeout))
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let reply = handle
        .lock()
        .expect("task poisoned")
        .context()
        .final_result
        .as_ref()
        .map(|f| f.text.clone())
        .unwrap_or_default();
    println!("{reply}");

    agent.stop().await;
    Ok(())
}

async fn list_tools(
    settings: Arc<Settings>,
    mcp_servers: Vec<McpServerConfig>,
) -> anyhow::Result<()> {
    let agent = build_agent(settings, mcp_servers).await?;
    for schema in agent.tool_registry().to_llm_tools() {
        println!("{:<20} {}", schema.name, schema.description);
    }
    Ok(())
}

fn list_skills(settings: &Settings) -> anyhow::Result<()> {
    let mut registry = SkillRegistry::new();
    let dir = Path::new(&settings.data_dir).join("skills");
    let loaded = registry.load_dir(&dir, SkillSource::User);
    for name in registry.names() {
        let skill = registry.get(&name).expect("registered name");
        println!("{:<24} {}", name, skill.skill.meta.description);
    }
    if loaded == 0 {
        println!("no skills found under {}", dir.display());
    }
    Ok(())
}
