//! Configuration module for intentwatch-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments and
//! environment variables, and validates it into the runtime types.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{
    ConnectionConfig, CorrelationConfig, ServerConfig, SupervisorConfig, WebhookConfig,
};
use alloy_primitives::Address;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable holding the node WebSocket endpoint.
pub const NODE_WS_URL_ENV: &str = "NODE_WS_URL";

/// Quiescence windows outside this range work but were never tuned.
const RECOMMENDED_QUIESCENCE_MS: std::ops::RangeInclusive<u64> = 3000..=5000;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("node endpoint not configured: set NODE_WS_URL or source.rpc_url")]
    MissingNodeUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub node_url: Url,
    pub contract_address: Address,
    pub connection: ConnectionConfig,
    pub correlation: CorrelationConfig,
    pub supervisor: SupervisorConfig,
    pub webhook: Option<WebhookConfig>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI and environment overrides
    /// 3. Validate the configuration
    /// 4. Build the runtime configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content, get_node_url())
    }

    fn load_str(
        &self,
        content: &str,
        node_url_env: Option<String>,
    ) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let Some(url) = node_url_env {
            file_config.source.rpc_url = Some(url);
        }

        self.validate(&file_config)?;
        self.build_loaded_config(file_config)
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let c = &config.connection;
        if !(c.backoff_factor >= 1.0) {
            return Err(invalid(format!(
                "connection.backoff_factor must be at least 1.0, got {}",
                c.backoff_factor
            )));
        }
        if c.max_reconnect_delay_ms < c.base_reconnect_delay_ms {
            return Err(invalid(
                "connection.max_reconnect_delay_ms must not be below base_reconnect_delay_ms",
            ));
        }
        let non_zero = [
            ("connection.base_reconnect_delay_ms", c.base_reconnect_delay_ms),
            ("connection.keep_alive_interval_secs", c.keep_alive_interval_secs),
            ("connection.stall_threshold_secs", c.stall_threshold_secs),
            (
                "connection.stale_activity_threshold_secs",
                c.stale_activity_threshold_secs,
            ),
            ("connection.connect_timeout_secs", c.connect_timeout_secs),
            (
                "correlation.quiescence_window_ms",
                config.correlation.quiescence_window_ms,
            ),
            (
                "supervisor.health_check_interval_secs",
                config.supervisor.health_check_interval_secs,
            ),
        ];
        for (key, value) in non_zero {
            if value == 0 {
                return Err(invalid(format!("{key} must be greater than zero")));
            }
        }
        if c.stale_activity_threshold_secs < c.stall_threshold_secs {
            return Err(invalid(
                "connection.stale_activity_threshold_secs must not be below stall_threshold_secs",
            ));
        }

        let window = config.correlation.quiescence_window_ms;
        if !RECOMMENDED_QUIESCENCE_MS.contains(&window) {
            tracing::warn!(
                quiescence_window_ms = window,
                "Quiescence window outside the recommended 3000-5000ms range"
            );
        }
        Ok(())
    }

    fn build_loaded_config(&self, file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        let rpc_url = file_config
            .source
            .rpc_url
            .as_deref()
            .ok_or(ConfigError::MissingNodeUrl)?;
        let node_url = Url::parse(rpc_url)?;
        if !matches!(node_url.scheme(), "ws" | "wss") {
            return Err(invalid(format!(
                "node endpoint must be a ws:// or wss:// URL, got {}",
                node_url.scheme()
            )));
        }

        let contract_address =
            Address::from_str(&file_config.source.contract_address).map_err(|e| {
                invalid(format!(
                    "source.contract_address {:?}: {e}",
                    file_config.source.contract_address
                ))
            })?;

        let webhook = file_config
            .webhook
            .map(|w| -> Result<WebhookConfig, ConfigError> {
                Ok(WebhookConfig {
                    url: Url::parse(&w.url)?,
                    timeout: Duration::from_secs(w.timeout_secs),
                    include_contract_events: w.include_contract_events,
                })
            })
            .transpose()?;

        let c = file_config.connection;
        Ok(LoadedConfig {
            server: ServerConfig {
                listen: file_config.server.listen,
                drain_timeout: Duration::from_secs(file_config.server.drain_timeout_secs),
            },
            node_url,
            contract_address,
            connection: ConnectionConfig {
                base_reconnect_delay: Duration::from_millis(c.base_reconnect_delay_ms),
                max_reconnect_delay: Duration::from_millis(c.max_reconnect_delay_ms),
                backoff_factor: c.backoff_factor,
                max_reconnect_attempts: c.max_reconnect_attempts,
                keep_alive_interval: Duration::from_secs(c.keep_alive_interval_secs),
                stall_threshold: Duration::from_secs(c.stall_threshold_secs),
                stale_activity_threshold: Duration::from_secs(c.stale_activity_threshold_secs),
                connect_timeout: Duration::from_secs(c.connect_timeout_secs),
                restart_delay: Duration::from_millis(c.restart_delay_ms),
            },
            correlation: CorrelationConfig {
                quiescence_window: Duration::from_millis(
                    file_config.correlation.quiescence_window_ms,
                ),
                quote_ttl: Duration::from_secs(file_config.correlation.quote_ttl_secs),
            },
            supervisor: SupervisorConfig {
                health_check_interval: Duration::from_secs(
                    file_config.supervisor.health_check_interval_secs,
                ),
            },
            webhook,
        })
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// Get the node endpoint from the environment.
pub fn get_node_url() -> Option<String> {
    std::env::var(NODE_WS_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[source]
rpc_url = "wss://file.example.com/ws"
contract_address = "0xca50c6df4efb6d1ed1c5e4c8cd8e0f0c4f8ab2b1"
"#;

    fn loader() -> ConfigLoader {
        ConfigLoader::new("./intentwatch.toml", None)
    }

    #[test]
    fn test_defaults_match_core_defaults() {
        let loaded = loader().load_str(BASE, None).unwrap();
        assert_eq!(loaded.connection, ConnectionConfig::default());
        assert_eq!(loaded.correlation, CorrelationConfig::default());
        assert_eq!(
            loaded.supervisor.health_check_interval,
            Duration::from_secs(120)
        );
        assert_eq!(loaded.node_url.as_str(), "wss://file.example.com/ws");
        assert!(loaded.webhook.is_none());
    }

    #[test]
    fn test_env_url_and_listen_override() {
        let listen: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loaded = ConfigLoader::new("./intentwatch.toml", Some(listen))
            .load_str(BASE, Some("ws://localhost:8546".to_string()))
            .unwrap();
        assert_eq!(loaded.node_url.as_str(), "ws://localhost:8546/");
        assert_eq!(loaded.server.listen, listen);
    }

    #[test]
    fn test_missing_node_url() {
        let content = r#"
[source]
contract_address = "0xca50c6df4efb6d1ed1c5e4c8cd8e0f0c4f8ab2b1"
"#;
        assert!(matches!(
            loader().load_str(content, None),
            Err(ConfigError::MissingNodeUrl)
        ));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            "[connection]\nbackoff_factor = 0.5\n",
            "[connection]\nbase_reconnect_delay_ms = 5000\nmax_reconnect_delay_ms = 1000\n",
            "[connection]\nkeep_alive_interval_secs = 0\n",
            "[connection]\nstall_threshold_secs = 200\n",
            "[correlation]\nquiescence_window_ms = 0\n",
        ];
        for case in cases {
            let content = format!("{BASE}{case}");
            assert!(
                matches!(
                    loader().load_str(&content, None),
                    Err(ConfigError::ValidationError(_))
                ),
                "accepted: {case}"
            );
        }
    }

    #[test]
    fn test_rejects_bad_address_and_scheme() {
        let bad_address = r#"
[source]
rpc_url = "wss://file.example.com/ws"
contract_address = "0x1234"
"#;
        assert!(matches!(
            loader().load_str(bad_address, None),
            Err(ConfigError::ValidationError(_))
        ));

        assert!(matches!(
            loader().load_str(BASE, Some("https://node.example.com".to_string())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_unusual_quiescence_window_is_accepted() {
        let content = format!("{BASE}[correlation]\nquiescence_window_ms = 10000\n");
        let loaded = loader().load_str(&content, None).unwrap();
        assert_eq!(
            loaded.correlation.quiescence_window,
            Duration::from_millis(10_000)
        );
    }

    #[test]
    fn test_webhook_section() {
        let content = format!("{BASE}[webhook]\nurl = \"https://hooks.example.com/x\"\n");
        let webhook = loader().load_str(&content, None).unwrap().webhook.unwrap();
        assert_eq!(webhook.url.as_str(), "https://hooks.example.com/x");
        assert_eq!(webhook.timeout, Duration::from_secs(30));
        assert!(!webhook.include_contract_events);
    }
}
