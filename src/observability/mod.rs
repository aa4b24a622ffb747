//! Logging Setup
//!
//! Settings come from environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | RUST_LOG | info | `EnvFilter` directives |
//! | ACTION_BUFFER_LOG_JSON | false | Emit JSON lines instead of text |

use tracing_subscriber::EnvFilter;

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directives used when `RUST_LOG` is unset
    pub default_filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        LogConfig {
            json: std::env::var("ACTION_BUFFER_LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            ..Default::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global tracing subscriber. Fails if one is already set.
pub fn init_tracing(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_target(false);

    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.default_filter, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let config = LogConfig::default();
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
