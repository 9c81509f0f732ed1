//! Errors returned across the crate.

use strum::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandoffError {
    /// The caller sent something unusable: an empty query, an unknown agent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A feature was used without the settings it needs.
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("could not connect: {0}")]
    ConnectionFailed(String),

    /// The connection broke, or the peer answered with something unreadable.
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("no response within {0}ms")]
    Timeout(u64),

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An error object returned by the tool server.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("bad configuration: {0}")]
    Configuration(String),

    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Completion API answered with a non-success status.
    #[error("completion API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse grouping of [`HandoffError`], printed by the CLI next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Client,
    Configuration,
    Transport,
    Timeout,
    Remote,
    Upstream,
}

impl HandoffError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        use ErrorCategory::*;
        match self {
            Self::InvalidInput(_) => Client,
            Self::NotConfigured(_) | Self::Configuration(_) | Self::Authentication(_) => {
                Configuration
            }
            Self::ConnectionFailed(_) | Self::RequestFailed(_) | Self::Http(_) | Self::Io(_) => {
                Transport
            }
            Self::Timeout(_) => Timeout,
            Self::Remote { .. } | Self::Unsupported(_) => Remote,
            Self::RateLimited { .. } | Self::Api { .. } | Self::Json(_) => Upstream,
        }
    }

    /// True when the caller is at fault rather than this process or a peer.
    ///
    /// The CLI exits with status 2 for these and 1 for everything else.
    pub fn is_client_error(&self) -> bool {
        self.category() == ErrorCategory::Client
    }
}

pub type Result<T> = std::result::Result<T, HandoffError>;
