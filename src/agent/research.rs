//! Tool-using agent with a scratch context and optional remote tools.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Agent, AgentInput, AgentOutput, Conversation, HistoryRetention, ScratchContext, ToolFailure};
use crate::error::{HandoffError, Result};
use crate::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::builtin::local_tools;
use crate::tools::{DynamicTool, DynamicToolProvider, Tool, ToolArguments, ToolExecutionContext};
use crate::types::{AgentToolCall, GenerationSettings, ModelMessage};

const DEFAULT_NAME: &str = "Research Agent";
const DEFAULT_DESCRIPTION: &str = "Answers questions and keeps notes in its context";

/// Agent that offers local and remote tools to the model and applies the
/// tool calls it gets back.
pub struct ResearchAgent {
    name: String,
    description: String,
    provider: Arc<dyn ModelProvider>,
    system_prompt: Option<String>,
    settings: GenerationSettings,
    conversation: Conversation,
    context: ScratchContext,
    tools: Vec<Arc<dyn Tool>>,
    remote: Option<Arc<dyn DynamicToolProvider>>,
    remote_tools: Vec<DynamicTool>,
}

impl ResearchAgent {
    /// Create an agent with the local `search_web` and `save_to_context` tools.
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            provider,
            system_prompt: None,
            settings: GenerationSettings::default(),
            conversation: Conversation::new(),
            context: ScratchContext::new(),
            tools: local_tools(),
            remote: None,
            remote_tools: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retention(mut self, retention: HistoryRetention) -> Self {
        self.conversation.set_retention(retention);
        self
    }

    /// Add a local tool.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Attach a remote tool endpoint. Its tools are discovered in [`Agent::initialize`].
    pub fn with_remote_tools(mut self, remote: Arc<dyn DynamicToolProvider>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn context(&self) -> &ScratchContext {
        &self.context
    }

    /// Remote tool declarations cached by the last `initialize`.
    pub fn remote_tools(&self) -> &[DynamicTool] {
        &self.remote_tools
    }

    /// Invoke a remote tool directly.
    pub async fn execute_tool(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let remote = self.remote.as_ref().ok_or_else(|| {
            HandoffError::NotConfigured(format!("remote tool endpoint for '{name}'"))
        })?;
        remote.execute_tool(name, &ToolArguments::new(params)).await
    }

    /// Messages for the next completion request.
    ///
    /// The context turn is appended here only; it never enters the history.
    fn build_messages(&self) -> Vec<ModelMessage> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 2);
        if let Some(ref sys) = self.system_prompt {
            messages.push(ModelMessage::system(sys.clone()));
        }
        messages.extend(self.conversation.messages().iter().cloned());
        if let Some(rendered) = self.context.render() {
            messages.push(ModelMessage::system(rendered));
        }
        messages
    }

    /// Local tools first, then remote tools whose names do not collide.
    fn offered_tools(&self) -> Vec<ToolDefinition> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut defs = Vec::with_capacity(self.tools.len() + self.remote_tools.len());
        for tool in &self.tools {
            if seen.insert(tool.name()) {
                defs.push(tool.definition());
            }
        }
        for tool in &self.remote_tools {
            if seen.insert(tool.name.as_str()) {
                defs.push(tool.definition());
            } else {
                warn!(tool = %tool.name, "remote tool shadowed by a local tool");
            }
        }
        defs
    }

    async fn apply_tool_call(&self, call: &AgentToolCall) -> Result<serde_json::Value> {
        let args = ToolArguments::from_call_arguments(call.arguments.clone());
        if let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) {
            let ctx = ToolExecutionContext::new(self.context.clone());
            return tool.execute(&args, &ctx).await;
        }
        self.execute_tool(&call.name, args.into_value()).await
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    /// Connect the remote endpoint and cache its tool list.
    ///
    /// Not idempotent: a second call reopens the connection.
    async fn initialize(&mut self) -> Result<()> {
        let Some(remote) = self.remote.clone() else {
            return Ok(());
        };
        remote.connect().await?;
        self.remote_tools = remote.list_tools().await?;
        info!(
            agent = %self.name,
            remote_tools = self.remote_tools.len(),
            "remote tools discovered"
        );
        Ok(())
    }

    async fn process(&mut self, input: AgentInput) -> Result<AgentOutput> {
        let query = input.require_query()?.to_string();
        self.conversation.add_user_message(query);

        let tools = self.offered_tools();
        let request = ProviderRequest {
            messages: self.build_messages(),
            settings: self.settings.clone(),
            tools: (!tools.is_empty()).then_some(tools),
        };
        let response = self
            .provider
            .generate_text(&request)
            .await
            .inspect_err(|_| {
                self.conversation.discard_unanswered();
            })?;

        let mut tool_errors = Vec::new();
        for call in &response.tool_calls {
            debug!(agent = %self.name, tool = %call.name, "applying tool call");
            if let Err(e) = self.apply_tool_call(call).await {
                warn!(agent = %self.name, tool = %call.name, error = %e, "tool call failed");
                tool_errors.push(ToolFailure {
                    tool: call.name.clone(),
                    message: e.to_string(),
                });
            }
        }

        self.conversation.add_assistant_message(response.text.clone());

        Ok(AgentOutput {
            response: response.text,
            context: self.context.snapshot(),
            tool_errors,
            handled_by: None,
        })
    }

    async fn cleanup(&mut self) -> Result<()> {
        if let Some(remote) = self.remote.as_ref() {
            remote.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::ScriptedProvider;
    use crate::tools::AgentToolParameters;
    use crate::types::Role;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRemote {
        tools: Vec<DynamicTool>,
        calls: Mutex<Vec<(String, serde_json::Value)>>,
        connects: Mutex<u32>,
        closes: Mutex<u32>,
    }

    #[async_trait]
    impl DynamicToolProvider for FakeRemote {
        async fn connect(&self) -> Result<()> {
            *self.connects.lock().unwrap() += 1;
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<DynamicTool>> {
            Ok(self.tools.clone())
        }

        async fn execute_tool(
            &self,
            name: &str,
            args: &ToolArguments,
        ) -> Result<serde_json::Value> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), args.raw().clone()));
            Ok(json!({ "ok": name }))
        }

        async fn close(&self) -> Result<()> {
            *self.closes.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn remote_tool(name: &str) -> DynamicTool {
        DynamicTool {
            name: name.into(),
            description: format!("{name} remotely"),
            parameters: AgentToolParameters::empty(),
        }
    }

    fn system_turns(request: &ProviderRequest) -> Vec<&ModelMessage> {
        request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .collect()
    }

    #[tokio::test]
    async fn empty_context_sends_no_context_turn() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_text("hello");
        let mut agent = ResearchAgent::new(provider.clone());

        let out = agent.process(AgentInput::new("x")).await.unwrap();

        assert_eq!(out.response, "hello");
        assert!(out.context.is_empty());
        let requests = provider.requests();
        assert!(system_turns(&requests[0]).is_empty());
    }

    #[tokio::test]
    async fn context_turn_is_sent_once_and_not_persisted() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_tool_calls("noted", vec![("save_to_context", json!({"key":"k","value":"v"}))]);
        provider.queue_text("second");
        let mut agent = ResearchAgent::new(provider.clone());

        let first = agent.process(AgentInput::new("remember k")).await.unwrap();
        assert_eq!(first.context.get("k").map(String::as_str), Some("v"));

        let second = agent.process(AgentInput::new("what is k?")).await.unwrap();
        assert_eq!(second.context.get("k").map(String::as_str), Some("v"));

        let requests = provider.requests();
        let context_turns = system_turns(&requests[1]);
        assert_eq!(context_turns.len(), 1);
        assert_eq!(
            context_turns[0].content,
            "Current context:\n{\n  \"k\": \"v\"\n}"
        );
        assert_eq!(requests[1].messages.last().unwrap().role, Role::System);

        let roles: Vec<Role> = agent.conversation().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn stringified_arguments_are_accepted() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_tool_calls("ok", vec![("save_to_context", json!(r#"{"key":"a","value":"b"}"#))]);
        let mut agent = ResearchAgent::new(provider);

        let out = agent.process(AgentInput::new("q")).await.unwrap();
        assert_eq!(out.context.get("a").map(String::as_str), Some("b"));
        assert!(out.tool_errors.is_empty());
    }

    #[tokio::test]
    async fn missing_query_fails_before_any_request() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut agent = ResearchAgent::new(provider.clone());

        let err = agent.process(AgentInput::default()).await.unwrap_err();
        assert!(matches!(err, HandoffError::InvalidInput(_)));
        assert!(provider.requests().is_empty());
        assert!(agent.conversation().is_empty());
    }

    #[tokio::test]
    async fn execute_tool_without_endpoint_is_not_configured() {
        let agent = ResearchAgent::new(Arc::new(ScriptedProvider::new()));
        let err = agent.execute_tool("weather", json!({})).await.unwrap_err();
        assert!(matches!(err, HandoffError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn unknown_tool_without_endpoint_is_reported_not_fatal() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_tool_calls(
            "done",
            vec![("weather", json!({})), ("search_web", json!({"query":"rust"}))],
        );
        let mut agent = ResearchAgent::new(provider);

        let out = agent.process(AgentInput::new("q")).await.unwrap();

        assert_eq!(out.response, "done");
        let failed: Vec<&str> = out.tool_errors.iter().map(|f| f.tool.as_str()).collect();
        assert_eq!(failed, vec!["weather", "search_web"]);
        assert!(out.tool_errors[0].message.contains("is not configured"));
        assert!(out.tool_errors[1].message.starts_with("unsupported"));
    }

    #[tokio::test]
    async fn remote_tools_are_offered_and_dispatched() {
        let remote = Arc::new(FakeRemote {
            tools: vec![remote_tool("weather"), remote_tool("save_to_context")],
            ..Default::default()
        });
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_tool_calls("sunny", vec![("weather", json!({"city":"Oslo"}))]);
        let mut agent = ResearchAgent::new(provider.clone()).with_remote_tools(remote.clone());

        agent.initialize().await.unwrap();
        assert_eq!(agent.remote_tools().len(), 2);

        let out = agent.process(AgentInput::new("weather?")).await.unwrap();
        assert!(out.tool_errors.is_empty());

        let offered: Vec<String> = provider.requests()[0]
            .tools
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(offered, vec!["search_web", "save_to_context", "weather"]);

        let calls = remote.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("weather".to_string(), json!({"city":"Oslo"}))]);
    }

    #[tokio::test]
    async fn initialize_twice_reconnects_and_cleanup_closes() {
        let remote = Arc::new(FakeRemote::default());
        let mut agent =
            ResearchAgent::new(Arc::new(ScriptedProvider::new())).with_remote_tools(remote.clone());

        agent.initialize().await.unwrap();
        agent.initialize().await.unwrap();
        agent.cleanup().await.unwrap();

        assert_eq!(*remote.connects.lock().unwrap(), 2);
        assert_eq!(*remote.closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_completion_discards_the_user_turn() {
        let provider = Arc::new(ScriptedProvider::new());
        let mut agent = ResearchAgent::new(provider.clone());

        let err = agent.process(AgentInput::new("lost")).await.unwrap_err();
        assert!(matches!(err, HandoffError::Api { status: 500, .. }));
        assert!(agent.conversation().is_empty());

        provider.queue_text("ok");
        agent.process(AgentInput::new("kept")).await.unwrap();
        let roles: Vec<Role> = agent.conversation().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn cleanup_without_endpoint_is_noop() {
        let mut agent = ResearchAgent::new(Arc::new(ScriptedProvider::new()));
        agent.cleanup().await.unwrap();
        agent.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn system_prompt_precedes_history() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_text("ok");
        let mut agent = ResearchAgent::new(provider.clone()).with_system_prompt("be terse");

        agent.process(AgentInput::new("q")).await.unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "be terse");
        assert_eq!(request.messages[1].content, "q");
    }
}
