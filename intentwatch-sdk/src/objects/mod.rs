pub mod health;
pub mod notification;

pub use health::{ConnectionHealth, ConnectionStatus};
pub use notification::{IntentQuotePayload, NotificationPayload};
