//! Named agents behind per-agent locks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{default_handoff_agents, Agent, AgentInput, AgentOutput, ResearchAgent};
use crate::config::HandoffConfig;
use crate::error::{HandoffError, Result};
use crate::provider::{create_provider, ModelProvider};

/// Key of the tool-using agent built by [`AgentRegistry::from_config`].
pub const RESEARCH_AGENT: &str = "research";
/// Key of the triage agent built by [`AgentRegistry::from_config`].
pub const TRIAGE_AGENT: &str = "triage";

type SharedAgent = Arc<Mutex<Box<dyn Agent>>>;

/// Agents addressable by key.
///
/// Each agent sits behind its own lock so a conversation sees its turns in
/// order while different agents serve queries concurrently.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, SharedAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the default agents from configuration.
    pub fn from_config(config: &HandoffConfig) -> Result<Self> {
        let provider = create_provider(config)?;
        Ok(Self::with_provider(config, provider))
    }

    /// Build the default agents around an existing provider.
    pub fn with_provider(config: &HandoffConfig, provider: Arc<dyn ModelProvider>) -> Self {
        let research = ResearchAgent::new(provider.clone()).with_retention(config.history_retention());

        #[cfg(feature = "remote")]
        let research = match config.remote_tool_options() {
            Some(options) => research.with_remote_tools(Arc::new(
                crate::remote::RemoteToolClient::new(options),
            )),
            None => research,
        };

        let mut registry = Self::new();
        registry.register(RESEARCH_AGENT, research);
        registry.register(TRIAGE_AGENT, default_handoff_agents(provider));
        registry
    }

    /// Add or replace the agent stored under `key`.
    pub fn register(&mut self, key: impl Into<String>, agent: impl Agent + 'static) {
        let key = key.into();
        if self
            .agents
            .insert(key.clone(), Arc::new(Mutex::new(Box::new(agent))))
            .is_some()
        {
            warn!(agent = %key, "replaced registered agent");
        }
    }

    pub fn get(&self, key: &str) -> Option<SharedAgent> {
        self.agents.get(key).cloned()
    }

    /// Registered keys, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Route one query to the agent under `key`.
    pub async fn process(&self, key: &str, input: AgentInput) -> Result<AgentOutput> {
        let agent = self
            .get(key)
            .ok_or_else(|| HandoffError::InvalidInput(format!("unknown agent '{key}'")))?;
        let mut agent = agent.lock().await;
        agent.process(input).await
    }

    /// Initialize every agent; the first failure aborts.
    pub async fn initialize_all(&self) -> Result<()> {
        for key in self.names() {
            let agent = &self.agents[key];
            agent.lock().await.initialize().await?;
        }
        info!(agents = self.agents.len(), "agents initialized");
        Ok(())
    }

    /// Clean up every agent, logging failures and returning the first one.
    pub async fn shutdown(&self) -> Result<()> {
        let mut first_err = None;
        for key in self.names() {
            let agent = &self.agents[key];
            if let Err(e) = agent.lock().await.cleanup().await {
                warn!(agent = %key, error = %e, "cleanup failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
