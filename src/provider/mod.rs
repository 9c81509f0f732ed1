//! Completion provider trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::HandoffConfig;
use crate::error::Result;
use crate::types::{AgentToolCall, FinishReason, GenerationSettings, ModelMessage, Usage};

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<AgentToolCall>,
    pub finish_reason: Option<FinishReason>,
}

/// The seam to a hosted completion API.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Request one completion.
    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse>;
}

/// Create the completion provider described by `config`.
pub fn create_provider(config: &HandoffConfig) -> Result<Arc<dyn ModelProvider>> {
    let api_key = config.require_openai_api_key()?;
    Ok(Arc::new(openai::OpenAiProvider::new(
        config.model.clone(),
        api_key.to_string(),
        config.openai_base_url.clone(),
    )))
}
