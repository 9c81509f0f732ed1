//! Token usage reported by the completion API.

use serde::{Deserialize, Serialize};

/// Token counts for one completion.
///
/// Deserializes from both `input_tokens`/`output_tokens` and the Chat
/// Completions `prompt_tokens`/`completion_tokens` spelling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, alias = "prompt_tokens")]
    pub input_tokens: u32,
    #[serde(default, alias = "completion_tokens")]
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_chat_completions_field_names() {
        let usage: Usage = serde_json::from_value(json!({
            "prompt_tokens": 12,
            "completion_tokens": 7,
            "total_tokens": 19
        }))
        .unwrap();
        assert_eq!(
            usage,
            Usage {
                input_tokens: 12,
                output_tokens: 7,
                total_tokens: 19
            }
        );
    }
}
