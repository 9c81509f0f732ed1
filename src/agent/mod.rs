//! Agents: conversation state, tool application, and triage handoff.

pub mod context;
pub mod conversation;
pub mod registry;
pub mod research;
pub mod specialist;
pub mod triage;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{HandoffError, Result};

pub use context::ScratchContext;
pub use conversation::{Conversation, HistoryRetention};
pub use registry::AgentRegistry;
pub use research::ResearchAgent;
pub use specialist::SpecialistAgent;
pub use triage::{default_handoff_agents, TriageAgent};

/// Input accepted by [`Agent::process`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    #[serde(default)]
    pub query: Option<String>,
}

impl AgentInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
        }
    }

    /// The query text; missing or blank input is the caller's error.
    pub fn require_query(&self) -> Result<&str> {
        match self.query.as_deref() {
            Some(q) if !q.trim().is_empty() => Ok(q),
            _ => Err(HandoffError::InvalidInput("Missing query parameter".into())),
        }
    }
}

/// A tool call that failed while an agent processed a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub tool: String,
    pub message: String,
}

/// Result of [`Agent::process`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub response: String,
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_errors: Vec<ToolFailure>,
    /// Name of the agent that produced `response`, when it was handed off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled_by: Option<String>,
}

/// Capability shared by every agent.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// One-line summary a triage agent uses when deciding on a handoff.
    fn description(&self) -> &str {
        ""
    }

    /// Acquire external resources (remote tool connections).
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Turn one user query into a response.
    async fn process(&mut self, input: AgentInput) -> Result<AgentOutput>;

    /// Release external resources. Safe to call when none are held.
    async fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}
