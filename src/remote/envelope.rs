//! Request/response envelopes of the remote tool protocol.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{HandoffError, Result};

/// Value of the `protocol` field on every outbound request.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Code reported when a server's error carries none (JSON-RPC "internal error").
pub const UNSPECIFIED_ERROR_CODE: i64 = -32603;

/// Outbound request frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEnvelope {
    pub protocol: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl RequestEnvelope {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            protocol: PROTOCOL_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// Error carried by a failed response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    /// Read whatever a server put under `error`.
    ///
    /// A missing `code`, a missing `message` or a bare string still fail the
    /// request. Only `null` means no error.
    pub fn from_wire(value: Value) -> Option<Self> {
        let (code, message, data) = match value {
            Value::Null => return None,
            Value::Object(mut map) => {
                let code = map
                    .get("code")
                    .and_then(Value::as_i64)
                    .unwrap_or(UNSPECIFIED_ERROR_CODE);
                let message = match map.get("message").and_then(Value::as_str) {
                    Some(message) => message.to_string(),
                    None => Value::Object(map.clone()).to_string(),
                };
                (code, message, map.remove("data"))
            }
            Value::String(message) => (UNSPECIFIED_ERROR_CODE, message, None),
            other => (UNSPECIFIED_ERROR_CODE, other.to_string(), None),
        };
        Some(Self {
            code,
            message,
            data,
        })
    }
}

fn lenient_error<'de, D>(deserializer: D) -> std::result::Result<Option<RpcError>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(RpcError::from_wire))
}

/// Request id named by a response `id` field. Numeric strings are accepted.
pub fn correlation_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Inbound response frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default, deserialize_with = "lenient_error")]
    pub error: Option<RpcError>,
}

impl ResponseEnvelope {
    /// The request id this frame answers.
    pub fn correlation_id(&self) -> Option<u64> {
        self.id.as_ref().and_then(correlation_id)
    }

    /// `result` on success (`None` when absent or null), or the remote error.
    pub fn into_result(self) -> Result<Option<Value>> {
        match self.error {
            Some(err) => Err(HandoffError::Remote {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}
