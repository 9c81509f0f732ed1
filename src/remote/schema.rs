//! Tool declarations returned by `get_tools`.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{HandoffError, Result};
use crate::tools::{AgentToolParameters, DynamicTool};

/// A tool declared by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteToolSchema {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

impl RemoteToolSchema {
    /// Parse one declaration.
    ///
    /// Accepts the flat `{name, description, parameters}` shape, the
    /// `input_schema`/`inputSchema` spellings, and the function-calling
    /// `{type: "function", function: {...}}` wrapper.
    pub fn from_value(value: &Value) -> Option<Self> {
        let decl = value.get("function").filter(|f| f.is_object()).unwrap_or(value);
        let name = decl.get("name")?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }
        let parameters = ["parameters", "input_schema", "inputSchema"]
            .iter()
            .find_map(|key| decl.get(*key).filter(|v| v.is_object()))
            .cloned()
            .unwrap_or_else(|| AgentToolParameters::empty().schema);

        Some(Self {
            name: name.to_string(),
            description: decl
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            parameters,
        })
    }

    pub fn into_dynamic_tool(self) -> DynamicTool {
        DynamicTool {
            description: self.description.unwrap_or_default(),
            name: self.name,
            parameters: AgentToolParameters::from_schema(self.parameters),
        }
    }
}

/// Parse a `get_tools` result: an array, `{"tools": [...]}`, or nothing.
pub fn parse_tool_list(result: Value) -> Result<Vec<RemoteToolSchema>> {
    let entries = match result {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("tools") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(HandoffError::RequestFailed(
                    "get_tools result has no tool list".into(),
                ))
            }
        },
        other => {
            return Err(HandoffError::RequestFailed(format!(
                "get_tools result must be an array, got {other}"
            )))
        }
    };

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let parsed = RemoteToolSchema::from_value(entry);
            if parsed.is_none() {
                warn!(entry = %entry, "skipping malformed tool declaration");
            }
            parsed
        })
        .collect())
}
