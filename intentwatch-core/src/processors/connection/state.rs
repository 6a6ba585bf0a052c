use intentwatch_sdk::objects::{ConnectionHealth, ConnectionStatus};
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle status of the node link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal. Nothing changes after this.
    Destroyed,
}

impl From<LinkStatus> for ConnectionStatus {
    fn from(status: LinkStatus) -> Self {
        match status {
            LinkStatus::Disconnected => ConnectionStatus::Disconnected,
            LinkStatus::Connecting => ConnectionStatus::Connecting,
            LinkStatus::Connected => ConnectionStatus::Connected,
            LinkStatus::Destroyed => ConnectionStatus::Destroyed,
        }
    }
}

/// Snapshot of the connection manager state, published on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: LinkStatus,
    pub reconnect_attempts: u32,
    pub current_backoff: Duration,
    /// Last inbound data, ping or pong.
    pub last_activity_at: Instant,
    /// Whether the transport reported open when last observed.
    pub transport_open: bool,
}

impl ConnectionState {
    pub fn new(base_backoff: Duration) -> Self {
        Self {
            status: LinkStatus::Disconnected,
            reconnect_attempts: 0,
            current_backoff: base_backoff,
            last_activity_at: Instant::now(),
            transport_open: false,
        }
    }

    /// Open transport and activity within `stale_after` of `now`.
    ///
    /// An open socket that has delivered nothing recently is not trusted.
    pub fn is_connected_at(&self, now: Instant, stale_after: Duration) -> bool {
        self.transport_open && now.saturating_duration_since(self.last_activity_at) < stale_after
    }

    pub fn health_at(&self, now: Instant, stale_after: Duration) -> ConnectionHealth {
        ConnectionHealth {
            status: self.status.into(),
            is_connected: self.is_connected_at(now, stale_after),
            reconnect_attempts: self.reconnect_attempts,
            last_activity_secs_ago: now.saturating_duration_since(self.last_activity_at).as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STALE: Duration = Duration::from_secs(120);

    #[tokio::test(start_paused = true)]
    async fn test_is_connected_requires_recent_activity() {
        let mut state = ConnectionState::new(Duration::from_secs(1));
        state.status = LinkStatus::Connected;
        state.transport_open = true;
        let start = state.last_activity_at;

        assert!(state.is_connected_at(start, STALE));
        assert!(state.is_connected_at(start + Duration::from_millis(119_999), STALE));
        assert!(!state.is_connected_at(start + Duration::from_millis(120_000), STALE));
        assert!(!state.is_connected_at(start + Duration::from_secs(600), STALE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_is_connected_requires_open_transport() {
        let mut state = ConnectionState::new(Duration::from_secs(1));
        state.status = LinkStatus::Connected;
        state.transport_open = false;
        assert!(!state.is_connected_at(state.last_activity_at, STALE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_snapshot() {
        let mut state = ConnectionState::new(Duration::from_secs(1));
        state.reconnect_attempts = 3;
        let health = state.health_at(state.last_activity_at + Duration::from_secs(42), STALE);
        assert_eq!(health.status, ConnectionStatus::Disconnected);
        assert!(!health.is_connected);
        assert_eq!(health.reconnect_attempts, 3);
        assert_eq!(health.last_activity_secs_ago, 42);
    }
}
