//! Connection health objects served by `GET /connection`.

use serde::{Deserialize, Serialize};

/// Lifecycle status of the node subscription.
///
/// This is the API/DTO version. The state machine itself lives in
/// `intentwatch-core::processors::connection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Destroyed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Snapshot of the subscription health for an external supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub status: ConnectionStatus,
    /// Open transport and recent activity.
    pub is_connected: bool,
    pub reconnect_attempts: u32,
    pub last_activity_secs_ago: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_serialization() {
        let health = ConnectionHealth {
            status: ConnectionStatus::Connected,
            is_connected: true,
            reconnect_attempts: 0,
            last_activity_secs_ago: 4,
        };
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "connected");
        assert_eq!(json["is_connected"], true);
        assert_eq!(json["last_activity_secs_ago"], 4);
    }
}
