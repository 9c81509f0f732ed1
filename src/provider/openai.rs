//! OpenAI-compatible Chat Completions provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{HandoffError, Result};
use crate::types::{AgentToolCall, FinishReason, GenerationSettings, Role, Usage};

use super::http::{bearer_headers, error_for_status, shared_client};
use super::{ModelProvider, ProviderRequest, ProviderResponse, ToolDefinition};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for `POST {base_url}/chat/completions`.
pub struct OpenAiProvider {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// `base_url` defaults to the public OpenAI endpoint; a trailing `/` is dropped.
    pub fn new(model: impl Into<String>, api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Result<Value> {
        let tools: Vec<FunctionTool<'_>> = request
            .tools
            .iter()
            .flatten()
            .map(|function| FunctionTool {
                kind: "function",
                function,
            })
            .collect();

        let body = ChatRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            tools,
            settings: &request.settings,
        };
        Ok(serde_json::to_value(body)?)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let body = self.build_request_body(request)?;
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "requesting chat completion"
        );

        let resp = shared_client()
            .post(self.endpoint())
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), &text));
        }

        let completion: ChatCompletion = resp.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| HandoffError::api(status.as_u16(), "completion has no choices"))?;

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            usage: completion.usage.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(WireToolCall::into_agent_call)
                .collect(),
            finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
        })
    }
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    s.parse().ok()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(flatten)]
    settings: &'a GenerationSettings,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize)]
struct FunctionTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl WireToolCall {
    /// Arguments arrive as a JSON-encoded string; unparseable text is kept as is.
    fn into_agent_call(self) -> AgentToolCall {
        let arguments = match self.function.arguments {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            other => other,
        };
        AgentToolCall {
            id: self.id,
            name: self.function.name,
            arguments,
        }
    }
}
