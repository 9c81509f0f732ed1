//! CLI entry point for handoff.

pub mod commands;

use clap::{Parser, Subcommand};

/// Handoff agent CLI
#[derive(Parser, Debug)]
#[command(name = "handoff", version, about = "Tool-calling agents with triage handoff")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one query to an agent
    Ask(AskArgs),
    /// List the tools the remote tool server offers
    Tools,
    /// Invoke a remote tool directly
    Call(CallArgs),
}

/// Arguments for `handoff ask`.
#[derive(Parser, Debug)]
pub struct AskArgs {
    /// Registered agent to route the query to (research, triage)
    #[arg(short, long, default_value = "research")]
    pub agent: String,

    /// The query (positional)
    pub query: String,
}

/// Arguments for `handoff call`.
#[derive(Parser, Debug)]
pub struct CallArgs {
    /// Remote tool name
    pub tool: String,

    /// Tool parameters as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub params: String,
}
