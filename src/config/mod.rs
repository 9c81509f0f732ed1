//! Configuration system (layered: defaults < TOML file < environment).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::agent::HistoryRetention;
use crate::error::{HandoffError, Result};

/// Model used when neither the file nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Interval between keepalive pings on the remote tool connection.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;

const CONFIG_FILE_NAME: &str = "handoff.toml";

/// Resolved configuration for agents and the remote tool client.
///
/// Resolution order, later wins:
/// 1. Built-in defaults
/// 2. `handoff.toml` (path from `HANDOFF_CONFIG` or the platform config dir)
/// 3. Environment variables (a `.env` file is loaded first if present)
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: String,
    pub tool_server_url: Option<String>,
    pub tool_server_api_key: Option<String>,
    pub tool_request_timeout_secs: Option<u64>,
    pub tool_keepalive_secs: u64,
    pub max_history_turns: Option<usize>,
}

impl fmt::Debug for HandoffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffConfig")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| ".."))
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("tool_server_url", &self.tool_server_url)
            .field(
                "tool_server_api_key",
                &self.tool_server_api_key.as_ref().map(|_| ".."),
            )
            .field("tool_request_timeout_secs", &self.tool_request_timeout_secs)
            .field("tool_keepalive_secs", &self.tool_keepalive_secs)
            .field("max_history_turns", &self.max_history_turns)
            .finish()
    }
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: None,
            model: DEFAULT_MODEL.to_string(),
            tool_server_url: None,
            tool_server_api_key: None,
            tool_request_timeout_secs: None,
            tool_keepalive_secs: DEFAULT_KEEPALIVE_SECS,
            max_history_turns: None,
        }
    }
}

impl HandoffConfig {
    /// Full layered load: defaults, then the config file if it exists, then env.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            HandoffError::Configuration(msg) => {
                HandoffError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| HandoffError::Configuration(e.to_string()))
    }

    /// Overlay values from an environment-like lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = non_empty("OPENAI_BASE_URL") {
            self.openai_base_url = Some(v);
        }
        if let Some(v) = non_empty("HANDOFF_MODEL") {
            self.model = v;
        }
        if let Some(v) = non_empty("TOOL_SERVER_URL") {
            self.tool_server_url = Some(v);
        }
        if let Some(v) = non_empty("TOOL_SERVER_API_KEY") {
            self.tool_server_api_key = Some(v);
        }
        if let Some(v) = non_empty("TOOL_REQUEST_TIMEOUT_SECS") {
            self.tool_request_timeout_secs = Some(parse_number("TOOL_REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = non_empty("TOOL_KEEPALIVE_SECS") {
            self.tool_keepalive_secs = parse_number("TOOL_KEEPALIVE_SECS", &v)?;
        }
        if let Some(v) = non_empty("HANDOFF_MAX_HISTORY_TURNS") {
            self.max_history_turns = Some(parse_number("HANDOFF_MAX_HISTORY_TURNS", &v)?);
        }
        Ok(())
    }

    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn with_openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tool_server(mut self, url: impl Into<String>, api_key: Option<String>) -> Self {
        self.tool_server_url = Some(url.into());
        self.tool_server_api_key = api_key;
        self
    }

    /// The completion API key, or an authentication error naming the variable.
    pub fn require_openai_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| HandoffError::Authentication("Missing OPENAI_API_KEY".into()))
    }

    pub fn tool_request_timeout(&self) -> Option<Duration> {
        self.tool_request_timeout_secs.map(Duration::from_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.tool_keepalive_secs.max(1))
    }

    pub fn history_retention(&self) -> HistoryRetention {
        match self.max_history_turns {
            Some(max) => HistoryRetention::MaxTurns(max),
            None => HistoryRetention::Unbounded,
        }
    }

    /// Remote tool client options, when a tool server is configured.
    #[cfg(feature = "remote")]
    pub fn remote_tool_options(&self) -> Option<crate::remote::RemoteToolOptions> {
        let url = self.tool_server_url.clone()?;
        Some(
            crate::remote::RemoteToolOptions::builder()
                .url(url)
                .maybe_api_key(self.tool_server_api_key.clone())
                .keepalive_interval(self.keepalive_interval())
                .maybe_request_timeout(self.tool_request_timeout())
                .build(),
        )
    }
}

/// Path of the config file: `HANDOFF_CONFIG`, else `<config dir>/handoff.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("HANDOFF_CONFIG") {
        return Some(PathBuf::from(path));
    }
    directories::ProjectDirs::from("", "", "handoff")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| HandoffError::Configuration(format!("{key} must be a number, got '{raw}'")))
}
