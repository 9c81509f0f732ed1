//! Typed access to tool call arguments.

use crate::error::{HandoffError, Result};

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Normalize arguments as the model sent them.
    ///
    /// Providers hand back arguments as a JSON string; a string that parses
    /// to an object is unwrapped, an empty string or `null` becomes `{}`.
    pub fn from_call_arguments(value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::Null => serde_json::json!({}),
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    serde_json::json!({})
                } else {
                    match serde_json::from_str::<serde_json::Value>(trimmed) {
                        Ok(parsed @ serde_json::Value::Object(_)) => parsed,
                        _ => serde_json::Value::String(raw),
                    }
                }
            }
            other => other,
        };
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandoffError::InvalidInput(format!("Missing string argument: {key}")))
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            HandoffError::InvalidInput(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
