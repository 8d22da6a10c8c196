//! Bridge configuration
//!
//! Loaded from `$XDG_CONFIG_HOME/cozbridge/config.toml`. Every field has a
//! default, so an absent or partial file is fine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cozbridge_protocol::DEFAULT_URL;
use cozbridge_utils::{config_file, BridgeError, Result};

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Websocket URL of the robot peer
    pub url: String,
    pub reconnect: ReconnectConfig,
    pub calls: CallConfig,
    pub state: StateConfig,
    pub logging: LoggingConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            reconnect: ReconnectConfig::default(),
            calls: CallConfig::default(),
            state: StateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Reconnection policy
///
/// A fixed interval with no growth; `max_attempts` caps consecutive failed
/// attempts, absent means retry forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub interval_ms: u64,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Remote call settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Delay before the single resend of a message sent while disconnected
    pub send_retry_delay_ms: u64,
    /// Timeout for awaited calls that do not specify their own
    pub default_timeout_ms: u64,
    /// Resolve in-flight calls immediately when the connection drops
    pub fail_pending_on_disconnect: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            send_retry_delay_ms: 500,
            default_timeout_ms: 10_000,
            fail_pending_on_disconnect: false,
        }
    }
}

impl CallConfig {
    pub fn send_retry_delay(&self) -> Duration {
        Duration::from_millis(self.send_retry_delay_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// State polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// How long a state read waits for a push before using the fallback
    pub timeout_ms: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { timeout_ms: 500 }
    }
}

impl StateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".into(),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<BridgeConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(BridgeConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<BridgeConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| BridgeError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<BridgeConfig> {
        toml::from_str(content).map_err(|e| BridgeError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &BridgeConfig) -> Result<()> {
        let url = url::Url::parse(&config.url)
            .map_err(|e| BridgeError::config(format!("invalid url '{}': {}", config.url, e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(BridgeError::config(format!(
                "url must use ws:// or wss://, got '{}'",
                config.url
            )));
        }

        if config.reconnect.interval_ms == 0 {
            return Err(BridgeError::config("reconnect.interval_ms must be at least 1"));
        }

        if config.reconnect.max_attempts == Some(0) {
            return Err(BridgeError::config(
                "reconnect.max_attempts must be at least 1 (omit it to retry forever)",
            ));
        }

        if config.calls.default_timeout_ms == 0 {
            return Err(BridgeError::config("calls.default_timeout_ms must be at least 1"));
        }

        if config.state.timeout_ms == 0 {
            return Err(BridgeError::config("state.timeout_ms must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.url, "ws://localhost:26966");
        assert_eq!(config.reconnect.interval(), Duration::from_millis(2000));
        assert_eq!(config.reconnect.max_attempts, None);
        assert_eq!(config.calls.send_retry_delay(), Duration::from_millis(500));
        assert_eq!(config.calls.default_timeout(), Duration::from_secs(10));
        assert!(!config.calls.fail_pending_on_disconnect);
        assert_eq!(config.state.timeout(), Duration::from_millis(500));
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_parse_empty_config() {
        let config = ConfigLoader::parse("", Path::new("test.toml")).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            url = "ws://10.0.0.2:26966"

            [reconnect]
            max_attempts = 5

            [calls]
            fail_pending_on_disconnect = true
        "#;
        let config = ConfigLoader::parse(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.url, "ws://10.0.0.2:26966");
        assert_eq!(config.reconnect.max_attempts, Some(5));
        // Defaults for unspecified
        assert_eq!(config.reconnect.interval_ms, 2000);
        assert!(config.calls.fail_pending_on_disconnect);
        assert_eq!(config.calls.send_retry_delay_ms, 500);
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[state]\ntimeout_ms = 750\n").unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        ConfigLoader::validate(&config).unwrap();
        assert_eq!(config.state.timeout(), Duration::from_millis(750));
    }

    #[test]
    fn test_load_missing_path() {
        let result = ConfigLoader::load_from_path(Path::new("/nonexistent/cozbridge.toml"));
        assert!(matches!(result, Err(BridgeError::FileRead { .. })));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = ConfigLoader::parse("invalid { toml", Path::new("test.toml"));
        assert!(matches!(result, Err(BridgeError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BridgeConfig::default();
        config.url = "http://localhost:26966".into();
        assert!(ConfigLoader::validate(&config).is_err());

        let mut config = BridgeConfig::default();
        config.url = "not a url".into();
        assert!(ConfigLoader::validate(&config).is_err());

        let mut config = BridgeConfig::default();
        config.reconnect.interval_ms = 0;
        assert!(ConfigLoader::validate(&config).is_err());

        let mut config = BridgeConfig::default();
        config.reconnect.max_attempts = Some(0);
        assert!(ConfigLoader::validate(&config).is_err());

        let mut config = BridgeConfig::default();
        config.calls.default_timeout_ms = 0;
        assert!(ConfigLoader::validate(&config).is_err());

        let mut config = BridgeConfig::default();
        config.state.timeout_ms = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_accepts_wss() {
        let mut config = BridgeConfig::default();
        config.url = "wss://robot.local/bridge".into();
        assert!(ConfigLoader::validate(&config).is_ok());
    }
}
