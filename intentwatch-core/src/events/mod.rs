//! Event system for the notification pipeline.
//!
//! This module provides event types and channel infrastructure for the
//! asynchronous processing pipeline.
//!
//! # Event Flow
//!
//! 1. `ConnectionManager` emits `RawLog` -> `EventDispatcher`
//! 2. `EventDispatcher` decodes and emits `CorrelationInput` -> `CorrelationRunner`
//!    (intent fulfillments, prunes and quotes) or `Notification` -> `NotificationRelay`
//!    (everything else)
//! 3. `CorrelationRunner` emits one `Notification` per canonical intent outcome
//! 4. `NotificationRelay` fans notifications out to the configured consumers
//!
//! Every stage exits once its input channel closes, so dropping the
//! connection manager drains the whole pipeline.

pub mod channels;
pub mod types;

pub use channels::{
    CorrelationInputReceiver, CorrelationInputSender, DEFAULT_CHANNEL_BUFFER,
    NotificationReceiver, NotificationSender, RawLogReceiver, RawLogSender,
    correlation_input_channel, notification_channel, raw_log_channel,
};

pub use types::{
    CancelledIntent, CompletedIntent, CorrelationInput, IntentQuote, Notification, RawLog,
    UnrecognizedLog,
};
