//! Local tools every tool-using agent offers.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::HandoffError;
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::AgentToolParameters;

/// Reserved name of the tool that writes into the agent's scratch context.
pub const SAVE_TO_CONTEXT: &str = "save_to_context";

/// Name of the web search tool.
pub const SEARCH_WEB: &str = "search_web";

#[derive(Deserialize)]
struct SaveArgs {
    key: String,
    value: String,
}

/// Create the `save_to_context` tool: stores `key -> value` in the agent context.
pub fn save_to_context_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        SAVE_TO_CONTEXT,
        "Save information to agent's context",
        AgentToolParameters::object()
            .string("key", "Context key", true)
            .string("value", "Information to save", true)
            .build(),
        |args, ctx: ToolExecutionContext| async move {
            let SaveArgs { key, value } = args.deserialize()?;
            let saved = serde_json::json!({ "saved": key });
            ctx.context.insert(key, value);
            Ok(saved)
        },
    ))
}

/// Create the `search_web` tool.
///
/// No search backend is wired in, so every call fails with
/// [`HandoffError::Unsupported`] instead of silently doing nothing.
pub fn search_web_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        SEARCH_WEB,
        "Search the web for information",
        AgentToolParameters::object()
            .string("query", "Search query", true)
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let query = args.get_str("query")?;
            Err(HandoffError::Unsupported(format!(
                "{SEARCH_WEB} has no search backend (query: {query})"
            )))
        },
    ))
}

/// Both local tools, in the order they are offered to the model.
pub fn local_tools() -> Vec<Arc<dyn Tool>> {
    vec![search_web_tool(), save_to_context_tool()]
}
