//! Node transport abstraction.
//!
//! A [`Transport`] opens [`Session`]s. Each session owns one connection to
//! the node and reports everything it observes on a [`SessionEventReceiver`]:
//! subscribed logs, liveness traffic, closes and errors. The connection
//! manager is the only consumer of these events.

pub mod ws;

#[cfg(test)]
pub(crate) mod mock;

pub use ws::{WsSession, WsTransport};

use crate::events::RawLog;
use alloy_primitives::Address;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by a transport or session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket protocol or I/O error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON-RPC error response
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node did not answer in time
    #[error("timed out")]
    Timeout,

    /// The session was closed while a request was pending
    #[error("connection closed")]
    ConnectionClosed,

    /// The node sent something that could not be parsed
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Something observed on an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A log matching the subscription filter.
    Log(RawLog),
    /// Any other inbound traffic (responses, ping, pong).
    Activity,
    /// The connection was closed.
    Closed { code: u16, reason: String },
    /// The connection failed.
    Error(String),
}

pub type SessionEventSender = mpsc::Sender<SessionEvent>;
pub type SessionEventReceiver = mpsc::Receiver<SessionEvent>;

/// Create a session event channel.
pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    mpsc::channel(crate::events::DEFAULT_CHANNEL_BUFFER)
}

/// Factory of node sessions.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Session: Session;

    /// Open a new connection to the node.
    async fn open(&self) -> Result<(Self::Session, SessionEventReceiver), TransportError>;
}

/// One open connection to the node.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Subscribe to logs emitted by `address`, returning the subscription id.
    async fn subscribe_logs(&self, address: Address) -> Result<String, TransportError>;

    /// Lightweight metadata call used as a liveness probe. Returns the chain id.
    async fn probe(&self) -> Result<u64, TransportError>;

    /// Send a transport-level ping.
    async fn ping(&self) -> Result<(), TransportError>;

    /// Whether the underlying connection still reports open.
    fn is_open(&self) -> bool;

    /// Close the connection with a normal close code and stop reading.
    async fn close(&self);
}
