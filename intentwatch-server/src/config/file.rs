//! TOML file configuration structures.
//!
//! These structs directly map to the `intentwatch.toml` file format. Every
//! section is optional except `[source]`, which names the watched contract.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Webhook delivery is disabled when the section is absent.
    pub webhook: Option<WebhookConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// How long the pipeline may take to drain on shutdown.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_drain_timeout_secs() -> u64 {
    10
}

/// Event source section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// WebSocket JSON-RPC endpoint. `NODE_WS_URL` takes precedence.
    pub rpc_url: Option<String>,
    /// Address of the escrow contract to watch.
    pub contract_address: String,
}

/// Connection lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub base_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_reconnect_attempts: u32,
    pub keep_alive_interval_secs: u64,
    pub stall_threshold_secs: u64,
    pub stale_activity_threshold_secs: u64,
    pub connect_timeout_secs: u64,
    pub restart_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30_000,
            backoff_factor: 1.5,
            max_reconnect_attempts: 50,
            keep_alive_interval_secs: 30,
            stall_threshold_secs: 90,
            stale_activity_threshold_secs: 120,
            connect_timeout_secs: 15,
            restart_delay_ms: 3000,
        }
    }
}

/// Transaction correlation window tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub quiescence_window_ms: u64,
    pub quote_ttl_secs: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            quiescence_window_ms: 3000,
            quote_ttl_secs: 60 * 60,
        }
    }
}

/// External health-check loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub health_check_interval_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 120,
        }
    }
}

/// Webhook delivery section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
    /// Also forward every other decoded contract event.
    #[serde(default)]
    pub include_contract_events: bool,
}

fn default_webhook_timeout_secs() -> u64 {
    intentwatch_core::consumers::webhook::DEFAULT_TIMEOUT.as_secs()
}
