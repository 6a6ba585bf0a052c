//! Validated runtime configuration of the server binary.
//!
//! Pipeline tuning types live in `intentwatch-core::config` and are
//! re-exported here next to the server-only sections.

pub use intentwatch_core::config::{ConnectionConfig, CorrelationConfig};

use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub drain_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub health_check_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: Url,
    pub timeout: Duration,
    pub include_contract_events: bool,
}
