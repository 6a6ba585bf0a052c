//! Application state shared across all request handlers.

use intentwatch_core::processors::ConnectionHandle;

/// Application state that is shared across all request handlers.
///
/// Cloning is cheap: the connection handle only holds channel endpoints.
#[derive(Clone)]
pub struct AppState {
    /// Control and health handle of the node subscription.
    pub connection: ConnectionHandle,
}

impl AppState {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self { connection }
    }
}
