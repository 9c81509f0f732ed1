//! Command handlers. Each returns the JSON document to print.

use serde_json::Value;
use tracing::warn;

use super::{AskArgs, CallArgs};
use crate::agent::{AgentInput, AgentRegistry};
use crate::config::HandoffConfig;
use crate::error::{HandoffError, Result};
use crate::remote::RemoteToolClient;

/// Route one query through the registry and return its output.
pub async fn handle_ask(config: &HandoffConfig, args: AskArgs) -> Result<Value> {
    let registry = AgentRegistry::from_config(config)?;
    let agent = registry.get(&args.agent).ok_or_else(|| {
        HandoffError::InvalidInput(format!(
            "unknown agent '{}', expected one of: {}",
            args.agent,
            registry.names().join(", ")
        ))
    })?;

    agent.lock().await.initialize().await?;
    let result = registry.process(&args.agent, AgentInput::new(args.query)).await;
    if let Err(e) = agent.lock().await.cleanup().await {
        warn!(error = %e, "agent cleanup failed");
    }

    Ok(serde_json::to_value(result?)?)
}

/// List the remote server's tools.
pub async fn handle_tools(config: &HandoffConfig) -> Result<Value> {
    let client = remote_client(config)?;
    let tools = client.get_available_tools().await;
    client.close().await?;
    Ok(serde_json::to_value(tools?)?)
}

/// Invoke one remote tool with JSON parameters.
pub async fn handle_call(config: &HandoffConfig, args: CallArgs) -> Result<Value> {
    let params: Value = serde_json::from_str(&args.params)
        .map_err(|e| HandoffError::InvalidInput(format!("--params is not valid JSON: {e}")))?;
    if !params.is_object() {
        return Err(HandoffError::InvalidInput(
            "--params must be a JSON object".into(),
        ));
    }

    let client = remote_client(config)?;
    let result = client.execute_tool(&args.tool, params).await;
    client.close().await?;
    result
}

fn remote_client(config: &HandoffConfig) -> Result<RemoteToolClient> {
    let options = config.remote_tool_options().ok_or_else(|| {
        HandoffError::NotConfigured("TOOL_SERVER_URL".into())
    })?;
    Ok(RemoteToolClient::new(options))
}
