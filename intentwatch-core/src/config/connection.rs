//! Connection lifecycle configuration.

use crate::utils::backoff::reconnect_delay;
use std::time::Duration;

/// Tuning knobs for the node subscription.
///
/// The defaults are the values the lifecycle manager was tuned with against
/// public Base RPC endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Delay floor of the reconnect backoff.
    pub base_reconnect_delay: Duration,
    /// Delay cap of the reconnect backoff.
    pub max_reconnect_delay: Duration,
    /// Multiplicative growth of the backoff per attempt.
    pub backoff_factor: f64,
    /// Attempts after which the manager stops retrying until `restart()`.
    pub max_reconnect_attempts: u32,
    /// Period of the keep-alive ping.
    pub keep_alive_interval: Duration,
    /// Silence after which the keep-alive forces a reconnect.
    pub stall_threshold: Duration,
    /// Silence after which `is_connected` reports false.
    pub stale_activity_threshold: Duration,
    /// Bound on open + subscribe + liveness probe.
    pub connect_timeout: Duration,
    /// Fixed delay between a manual restart and the next connect.
    pub restart_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_reconnect_delay: Duration::from_millis(1000),
            max_reconnect_delay: Duration::from_millis(30_000),
            backoff_factor: 1.5,
            max_reconnect_attempts: 50,
            keep_alive_interval: Duration::from_secs(30),
            stall_threshold: Duration::from_secs(90),
            stale_activity_threshold: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(15),
            restart_delay: Duration::from_secs(3),
        }
    }
}

impl ConnectionConfig {
    /// Backoff delay before reconnect attempt number `attempt`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        reconnect_delay(
            self.base_reconnect_delay,
            self.backoff_factor,
            attempt,
            self.max_reconnect_delay,
        )
    }
}
