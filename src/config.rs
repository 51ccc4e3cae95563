use crate::types::{RelayError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Source API client configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://m.weibo.cn".to_string(),
            user_agent: "weibo-relay/0.1".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Telegram sink configuration. `token` and `chat_id` are required;
/// everything else has working defaults.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: i64,
    pub api_base: String,
    /// Attempt budget per API call.
    pub max_attempts: u32,
    /// Fixed pacing sleep after every API call, success or not.
    pub pacing_seconds: u64,
}

impl TelegramConfig {
    pub fn new(token: String, chat_id: i64) -> Self {
        Self {
            token,
            chat_id,
            api_base: "https://api.telegram.org".to_string(),
            max_attempts: 3,
            pacing_seconds: 1,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(RelayError::Config("telegram token is empty".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(RelayError::Config(
                "telegram max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ledger sink configuration: everything lives under `root`
/// (`index.csv` plus an `images/` subdirectory).
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub root: PathBuf,
}

impl LedgerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(RelayError::Config("ledger root path is empty".to_string()));
        }
        Ok(())
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub feed_ids: Vec<u64>,
    /// Directory holding one watermark file per feed id.
    pub state_dir: PathBuf,
    /// Politeness pause between feeds in the outer loop.
    pub feed_pause_seconds: u64,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.feed_ids.is_empty() {
            return Err(RelayError::Config("no feed ids configured".to_string()));
        }
        Ok(())
    }
}
