//! Triage agent that hands a query off to the best-suited specialist.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Agent, AgentInput, AgentOutput, Conversation, SpecialistAgent, ToolFailure};
use crate::error::{HandoffError, Result};
use crate::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::AgentToolParameters;
use crate::types::{GenerationSettings, ModelMessage};

const HANDOFF_TOOL_PREFIX: &str = "transfer_to_";

/// Routes each query to one of its specialists by offering a
/// `transfer_to_<name>` tool per specialist.
pub struct TriageAgent {
    name: String,
    instructions: String,
    provider: Arc<dyn ModelProvider>,
    settings: GenerationSettings,
    conversation: Conversation,
    specialists: Vec<Box<dyn Agent>>,
}

impl TriageAgent {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        name: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            provider,
            settings: GenerationSettings::default(),
            conversation: Conversation::new(),
            specialists: Vec::new(),
        }
    }

    pub fn with_handoff(mut self, agent: impl Agent + 'static) -> Self {
        self.specialists.push(Box::new(agent));
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Names of the agents this triage agent can hand off to.
    pub fn handoff_names(&self) -> Vec<&str> {
        self.specialists.iter().map(|a| a.name()).collect()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    fn handoff_tools(&self) -> Vec<ToolDefinition> {
        self.specialists
            .iter()
            .map(|agent| ToolDefinition {
                name: handoff_tool_name(agent.name()),
                description: agent.description().to_string(),
                parameters: AgentToolParameters::empty().schema,
            })
            .collect()
    }

    fn specialist_for_tool(&self, tool_name: &str) -> Option<usize> {
        self.specialists
            .iter()
            .position(|agent| handoff_tool_name(agent.name()) == tool_name)
    }
}

#[async_trait]
impl Agent for TriageAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.instructions
    }

    async fn initialize(&mut self) -> Result<()> {
        for agent in &mut self.specialists {
            agent.initialize().await?;
        }
        Ok(())
    }

    async fn process(&mut self, input: AgentInput) -> Result<AgentOutput> {
        let query = input.require_query()?.to_string();
        self.conversation.add_user_message(query.clone());

        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        messages.push(ModelMessage::system(self.instructions.clone()));
        messages.extend(self.conversation.messages().iter().cloned());

        let tools = self.handoff_tools();
        let response = self
            .provider
            .generate_text(&ProviderRequest {
                messages,
                settings: self.settings.clone(),
                tools: (!tools.is_empty()).then_some(tools),
            })
            .await
            .inspect_err(|_| {
                self.conversation.discard_unanswered();
            })?;

        let target = response
            .tool_calls
            .iter()
            .find_map(|call| self.specialist_for_tool(&call.name));

        if let Some(index) = target {
            let specialist = &mut self.specialists[index];
            let specialist_name = specialist.name().to_string();
            info!(from = %self.name, to = %specialist_name, "handing off query");

            let mut output = specialist
                .process(AgentInput::new(query))
                .await
                .inspect_err(|_| {
                    self.conversation.discard_unanswered();
                })?;
            self.conversation.add_assistant_message(output.response.clone());
            output.handled_by.get_or_insert(specialist_name);
            return Ok(output);
        }

        let tool_errors = response
            .tool_calls
            .iter()
            .map(|call| {
                warn!(agent = %self.name, tool = %call.name, "unknown handoff target");
                ToolFailure {
                    tool: call.name.clone(),
                    message: HandoffError::Unsupported(format!(
                        "no agent registered for '{}'",
                        call.name
                    ))
                    .to_string(),
                }
            })
            .collect();

        self.conversation.add_assistant_message(response.text.clone());
        Ok(AgentOutput {
            response: response.text,
            tool_errors,
            ..Default::default()
        })
    }

    async fn cleanup(&mut self) -> Result<()> {
        for agent in &mut self.specialists {
            agent.cleanup().await?;
        }
        Ok(())
    }
}

/// `"Data Analysis Agent"` -> `"transfer_to_data_analysis_agent"`.
pub fn handoff_tool_name(agent_name: &str) -> String {
    let mut slug = String::with_capacity(agent_name.len());
    for ch in agent_name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    format!("{HANDOFF_TOOL_PREFIX}{slug}")
}

/// The research / data analysis / code generation specialists behind a triage agent.
pub fn default_handoff_agents(provider: Arc<dyn ModelProvider>) -> TriageAgent {
    let research = SpecialistAgent::new(
        provider.clone(),
        "Research Agent",
        "You are a research specialist who helps find and analyze information. \
         Break down complex topics, find relevant sources, and provide comprehensive summaries.",
        "Specialist agent for research and information gathering",
    );
    let data_analysis = SpecialistAgent::new(
        provider.clone(),
        "Data Analysis Agent",
        "You help analyze data and provide insights. Break down complex datasets, \
         perform statistical analysis, and explain findings clearly.",
        "Specialist agent for data analysis and statistics",
    );
    let code = SpecialistAgent::new(
        provider.clone(),
        "Code Generation Agent",
        "You help write and explain code. Follow best practices, provide clear \
         documentation, and explain your implementation choices.",
        "Specialist agent for programming and code generation",
    );

    TriageAgent::new(
        provider,
        "Triage Agent",
        "You determine which specialist agent is best suited for the user's request. \
         Consider the nature of the task and required expertise.",
    )
    .with_handoff(research)
    .with_handoff(data_analysis)
    .with_handoff(code)
}
