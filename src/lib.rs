//! Handoff: tool-calling agents with triage handoff.
//!
//! A [`agent::ResearchAgent`] keeps a conversation and a scratch context,
//! offers local and remote tools to an OpenAI-compatible completion API, and
//! applies the tool calls it gets back. A [`agent::TriageAgent`] forwards
//! queries to specialist agents. Remote tools live behind a persistent
//! WebSocket connection ([`remote::RemoteToolClient`]).
//!
//! # Quick Start
//!
//! ```no_run
//! use handoff::agent::{AgentInput, AgentRegistry};
//! use handoff::config::HandoffConfig;
//!
//! # async fn example() -> handoff::error::Result<()> {
//! let config = HandoffConfig::load()?;
//! let registry = AgentRegistry::from_config(&config)?;
//! registry.initialize_all().await?;
//! let output = registry.process("research", AgentInput::new("What is Rust?")).await?;
//! println!("{}", output.response);
//! registry.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod provider;
pub mod tools;
pub mod types;

#[cfg(feature = "remote")]
pub mod remote;

#[cfg(feature = "cli")]
pub mod cli;
