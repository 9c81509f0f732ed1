use handoff::error::HandoffError;
use handoff::provider::openai::OpenAiProvider;
use handoff::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use handoff::types::{FinishReason, GenerationSettings, ModelMessage};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> OpenAiProvider {
    OpenAiProvider::new("gpt-4", "test-key".to_string(), Some(server.uri()))
}

fn request_with_tool() -> ProviderRequest {
    ProviderRequest {
        messages: vec![ModelMessage::user("remember that k is v")],
        settings: GenerationSettings::default(),
        tools: Some(vec![ToolDefinition {
            name: "save_to_context".into(),
            description: "Save information to agent's context".into(),
            parameters: json!({
                "type": "object",
                "properties": { "key": { "type": "string" }, "value": { "type": "string" } },
                "required": ["key", "value"]
            }),
        }]),
    }
}

#[tokio::test]
async fn tool_calls_are_parsed_from_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "tool_choice": "auto",
            "messages": [{ "role": "user", "content": "remember that k is v" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": "Saved.",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "save_to_context",
                            "arguments": "{\"key\":\"k\",\"value\":\"v\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server)
        .generate_text(&request_with_tool())
        .await
        .expect("completion should succeed");

    assert_eq!(response.text, "Saved.");
    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
    assert_eq!(response.usage.total_tokens, 19);
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "save_to_context");
    assert_eq!(response.tool_calls[0].arguments, json!({ "key": "k", "value": "v" }));
}

#[tokio::test]
async fn null_content_becomes_empty_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": null }, "finish_reason": "stop" }]
        })))
        .mount(&server)
        .await;

    let response = provider(&server)
        .generate_text(&request_with_tool())
        .await
        .unwrap();

    assert_eq!(response.text, "");
    assert!(response.tool_calls.is_empty());
}

#[tokio::test]
async fn unauthorized_maps_to_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate_text(&request_with_tool())
        .await
        .unwrap_err();

    assert!(matches!(err, HandoffError::Authentication(msg) if msg.contains("invalid api key")));
}

#[tokio::test]
async fn rate_limit_and_server_errors_are_classified() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({ "error": { "retry_after": 2 } })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let first = provider.generate_text(&request_with_tool()).await.unwrap_err();
    let second = provider.generate_text(&request_with_tool()).await.unwrap_err();

    assert!(matches!(first, HandoffError::RateLimited { retry_after_ms: Some(2000) }));
    assert!(matches!(second, HandoffError::Api { status: 500, .. }));
}

#[tokio::test]
async fn empty_choices_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate_text(&request_with_tool())
        .await
        .unwrap_err();
    assert!(matches!(err, HandoffError::Api { .. }));
}
