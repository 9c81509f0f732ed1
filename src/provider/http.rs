//! HTTP plumbing shared by completion requests.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::error::HandoffError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Process-wide client so connections are pooled across agents.
pub fn shared_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default()
    })
}

/// JSON content type plus `Authorization: Bearer <key>`.
///
/// A key that is not a valid header value is left out, so the server answers
/// with 401 instead of the request failing locally.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}

/// Map a non-success response to an error.
///
/// Uses `error.message` from a JSON error body when present, else the raw body.
pub fn error_for_status(status: u16, body: &str) -> HandoffError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or(body)
        .to_string();

    match status {
        401 | 403 => HandoffError::Authentication(message),
        429 => HandoffError::RateLimited {
            retry_after_ms: error
                .and_then(|e| e.get("retry_after"))
                .and_then(Value::as_f64)
                .map(|secs| (secs * 1000.0) as u64),
        },
        _ => HandoffError::api(status, message),
    }
}
