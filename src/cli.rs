// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// otto — an autonomous LLM agent runtime.
///
/// With no subcommand, runs the agent on the terminal channel: type a
/// message, get a reply; `/help`, `/exit`, `/quit` are handled locally.
#[derive(Parser, Debug)]
#[command(name = "otto", version, about)]
pub struct Cli {
    /// Path to an explicit settings file (merged over the discovered ones).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr even in interactive mode.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// MCP server to import tools from, as `NAME=COMMAND [ARGS...]`.
    /// Repeatable; imported tools are named `NAME__tool`.
    #[arg(long = "mcp-server", value_name = "NAME=COMMAND", global = true)]
    pub mcp_servers: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent interactively on the terminal channel.
    Run,

    /// Submit a single message, print the reply, and exit.
    Submit {
        /// The message text.
        text: String,
        /// Seconds to wait for the task to finish.
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },

    /// Print the effective settings and exit.
    ShowConfig,

    /// List the registered tools and exit.
    ListTools,

    /// List the skills discovered under `{dataDir}/skills` and exit.
    ListSkills,
}
