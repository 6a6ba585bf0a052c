//! Event channel factories and handles.
//!
//! Provides factory functions for creating the pipeline channels with
//! appropriate buffer sizes.

use super::types::{CorrelationInput, Notification, RawLog};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// This provides enough buffer to handle bursts of logs from a single block
/// while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for raw logs.
pub type RawLogSender = mpsc::Sender<RawLog>;
/// Receiver handle for raw logs.
pub type RawLogReceiver = mpsc::Receiver<RawLog>;

/// Sender handle for correlation inputs.
pub type CorrelationInputSender = mpsc::Sender<CorrelationInput>;
/// Receiver handle for correlation inputs.
pub type CorrelationInputReceiver = mpsc::Receiver<CorrelationInput>;

/// Sender handle for notifications.
pub type NotificationSender = mpsc::Sender<Notification>;
/// Receiver handle for notifications.
pub type NotificationReceiver = mpsc::Receiver<Notification>;

/// Create a new raw log channel.
///
/// The connection manager owns the sender; it is dropped when the manager
/// is destroyed.
pub fn raw_log_channel() -> (RawLogSender, RawLogReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new correlation input channel.
pub fn correlation_input_channel() -> (CorrelationInputSender, CorrelationInputReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new notification channel.
///
/// Both the dispatcher and the correlation runner hold a clone of the
/// sender.
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
