//! Action Buffer Configuration
//!
//! Loaded from a TOML file and/or environment variables:
//!
//! | Key | Env | Default | Description |
//! |-----|-----|---------|-------------|
//! | idle_timeout_ms | ACTION_BUFFER_IDLE_MS | 60000 | Quiet period before a flush |
//! | flush_threshold | ACTION_BUFFER_THRESHOLD | 10 | Queue size that flushes immediately |
//! | endpoint | ACTION_BUFFER_ENDPOINT | http://127.0.0.1:7001/users/v1/actions | Ingestion URL |
//! | store_path | ACTION_BUFFER_STORE | - | Queue snapshot file (in-memory if unset) |
//! | delivery_timeout_ms | ACTION_BUFFER_DELIVERY_TIMEOUT_MS | 10000 | HTTP request timeout, 0 = none |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10;
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:7001/users/v1/actions";
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Configuration for an action buffer and its delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Quiet period after the last record before the queue is flushed
    #[serde(rename = "idle_timeout_ms", with = "duration_millis")]
    pub idle_timeout: Duration,
    /// Queue size at which a flush fires immediately
    pub flush_threshold: usize,
    /// Ingestion endpoint receiving `{"actions": [...]}`
    pub endpoint: String,
    /// Snapshot file for the queue; `None` keeps it in memory only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    /// Per-request HTTP timeout; zero disables it
    #[serde(rename = "delivery_timeout_ms", with = "duration_millis")]
    pub delivery_timeout: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            store_path: None,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

impl BufferConfig {
    /// Configuration for testing (short quiet period)
    pub fn test() -> Self {
        BufferConfig {
            idle_timeout: Duration::from_millis(1_000),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            endpoint: "http://127.0.0.1:0/users/v1/actions".to_string(),
            store_path: None,
            delivery_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: BufferConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overridden by `ACTION_BUFFER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("ACTION_BUFFER_IDLE_MS") {
            self.idle_timeout = Duration::from_millis(parse_env("ACTION_BUFFER_IDLE_MS", &value)?);
        }
        if let Some(value) = lookup("ACTION_BUFFER_THRESHOLD") {
            self.flush_threshold = parse_env("ACTION_BUFFER_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("ACTION_BUFFER_ENDPOINT") {
            self.endpoint = value;
        }
        if let Some(value) = lookup("ACTION_BUFFER_STORE") {
            self.store_path = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        if let Some(value) = lookup("ACTION_BUFFER_DELIVERY_TIMEOUT_MS") {
            self.delivery_timeout =
                Duration::from_millis(parse_env("ACTION_BUFFER_DELIVERY_TIMEOUT_MS", &value)?);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid("flush_threshold must be at least 1"));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid("idle_timeout_ms must be positive"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

/// Serde helper for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
