//! Event processors of the notification pipeline.
//!
//! - `ConnectionManager`: owns the node subscription, emits `RawLog`
//! - `EventDispatcher`: receives `RawLog`, emits `CorrelationInput` and `Notification`
//! - `CorrelationRunner`: receives `CorrelationInput`, emits intent outcome `Notification`s
//! - `NotificationRelay`: receives `Notification`, calls the consumers
//! - `HealthSupervisor`: polls the `ConnectionHandle`, restarts an untrusted link

pub mod connection;
pub mod correlation;
pub mod decoder;
pub mod dispatcher;
pub mod relay;
pub mod supervisor;

pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState, LinkStatus};
pub use correlation::{CorrelationRunner, CorrelationWindow};
pub use decoder::EventDecoder;
pub use dispatcher::EventDispatcher;
pub use relay::NotificationRelay;
pub use supervisor::HealthSupervisor;
