//! HealthSupervisor processor.
//!
//! Periodically polls a [`ConnectionHandle`] and calls `restart()` whenever
//! the link is not trusted. This is the only way out of the idle state the
//! connection manager enters after exhausting its reconnect attempts.

use super::connection::ConnectionHandle;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Default period of the health check.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(120);

pub struct HealthSupervisor {
    connection: ConnectionHandle,
    check_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl HealthSupervisor {
    pub fn new(
        connection: ConnectionHandle,
        check_interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connection,
            check_interval,
            shutdown_rx,
        }
    }

    /// Run until shutdown is signaled or the connection is destroyed.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            "HealthSupervisor started"
        );

        let mut ticker = interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("HealthSupervisor received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if self.connection.is_destroyed() {
                        info!("Connection destroyed, HealthSupervisor stopping");
                        break;
                    }
                    self.check().await;
                }
            }
        }

        info!("HealthSupervisor shutdown complete");
    }

    async fn check(&self) {
        if self.connection.is_connected() {
            debug!("Health check passed");
            return;
        }

        let state = self.connection.state();
        warn!(
            status = ?state.status,
            attempts = state.reconnect_attempts,
            "Health check failed, restarting connection"
        );
        self.connection.restart().await;
    }
}
