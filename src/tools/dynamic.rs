//! Runtime-discovered tools (e.g., from a remote tool server).

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::AgentToolParameters;
use crate::error::Result;
use crate::provider::ToolDefinition;

/// A tool discovered at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicTool {
    pub name: String,
    pub description: String,
    pub parameters: AgentToolParameters,
}

impl DynamicTool {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.schema.clone(),
        }
    }
}

/// A source of tools that lives outside the process.
///
/// Implemented by [`crate::remote::RemoteToolClient`]; agents depend on this
/// trait so they can be driven by an in-memory provider in tests.
#[async_trait]
pub trait DynamicToolProvider: Send + Sync {
    /// Open (or reopen) the underlying connection.
    async fn connect(&self) -> Result<()>;

    /// List available tools.
    async fn list_tools(&self) -> Result<Vec<DynamicTool>>;

    /// Execute a tool by name and return its result verbatim.
    async fn execute_tool(&self, name: &str, args: &ToolArguments) -> Result<serde_json::Value>;

    /// Close the underlying connection. Must be safe when never connected.
    async fn close(&self) -> Result<()>;
}
