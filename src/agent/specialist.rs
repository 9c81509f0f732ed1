//! Instruction-driven agent without tools, used as a handoff target.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Agent, AgentInput, AgentOutput, Conversation, HistoryRetention};
use crate::error::Result;
use crate::provider::{ModelProvider, ProviderRequest};
use crate::types::{GenerationSettings, ModelMessage};

/// An agent defined by its instructions and a handoff description.
pub struct SpecialistAgent {
    name: String,
    instructions: String,
    handoff_description: String,
    provider: Arc<dyn ModelProvider>,
    settings: GenerationSettings,
    conversation: Conversation,
}

impl SpecialistAgent {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        name: impl Into<String>,
        instructions: impl Into<String>,
        handoff_description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            handoff_description: handoff_description.into(),
            provider,
            settings: GenerationSettings::default(),
            conversation: Conversation::new(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retention(mut self, retention: HistoryRetention) -> Self {
        self.conversation.set_retention(retention);
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

#[async_trait]
impl Agent for SpecialistAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.handoff_description
    }

    async fn process(&mut self, input: AgentInput) -> Result<AgentOutput> {
        let query = input.require_query()?.to_string();
        self.conversation.add_user_message(query);

        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        messages.push(ModelMessage::system(self.instructions.clone()));
        messages.extend(self.conversation.messages().iter().cloned());

        let response = self
            .provider
            .generate_text(&ProviderRequest {
                messages,
                settings: self.settings.clone(),
                tools: None,
            })
            .await
            .inspect_err(|_| {
                self.conversation.discard_unanswered();
            })?;

        self.conversation.add_assistant_message(response.text.clone());

        Ok(AgentOutput {
            response: response.text,
            ..Default::default()
        })
    }
}
