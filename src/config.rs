//! Engine and transport configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::UserId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings of the edit-queue runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Owner of the persisted queue.
    pub user_id: UserId,
    /// Entries whose report is older than this many days are dropped on load.
    pub retention_days: u32,
    /// Wait after a connected transition before syncing starts.
    pub settle_delay_ms: u64,
    /// Language used to pick error message templates.
    pub language: String,
    pub command_queue_bound: usize,
    pub persist_queue_bound: usize,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            retention_days: 30,
            settle_delay_ms: 3000,
            language: "lv".to_string(),
            command_queue_bound: 256,
            persist_queue_bound: 64,
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_queue_bound == 0 || self.persist_queue_bound == 0 {
            return Err(ConfigError::Invalid("queue bounds must be non-zero".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be non-zero".to_string()));
        }
        if self.language.is_empty() {
            return Err(ConfigError::Invalid("language must be set".to_string()));
        }
        Ok(())
    }
}

/// Settings of [`crate::engine::http::HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub base_url: String,
    pub apply_edits_endpoint: String,
    pub timeout_ms: u64,
    pub bearer_token: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            apply_edits_endpoint: "/applyEdits".to_string(),
            timeout_ms: 30_000,
            bearer_token: None,
        }
    }
}

impl TransportConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) url, got {:?}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Full URL of the apply-edits operation.
    pub fn apply_edits_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.apply_edits_endpoint.trim_start_matches('/')
        )
    }
}
