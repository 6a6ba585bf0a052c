//! Downstream consumers of pipeline notifications.
//!
//! - `LogConsumer`: writes every outcome to the tracing log
//! - `WebhookConsumer`: POSTs a JSON payload per outcome

pub mod log;
pub mod payload;
pub mod webhook;

pub use self::log::LogConsumer;
pub use payload::to_payload;
pub use webhook::WebhookConsumer;

use crate::contract::events::DecodedLog;
use crate::events::{CancelledIntent, CompletedIntent, UnrecognizedLog};
use async_trait::async_trait;
use thiserror::Error;

/// Errors a consumer may report back to the relay.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    /// Payload serialization error
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Receiver of canonical intent outcomes and pass-through events.
#[async_trait]
pub trait NotificationConsumer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn on_completed(&self, completed: &CompletedIntent) -> Result<(), ConsumerError>;

    async fn on_cancelled(&self, cancelled: &CancelledIntent) -> Result<(), ConsumerError>;

    /// A log that could not be decoded, with its inferred id and signature.
    async fn on_unrecognized(&self, unrecognized: &UnrecognizedLog) -> Result<(), ConsumerError>;

    /// Any other decoded contract event. Ignored by default.
    async fn on_event(&self, _event: &DecodedLog) -> Result<(), ConsumerError> {
        Ok(())
    }
}
