//! Connection lifecycle of the node subscription.
//!
//! [`ConnectionManager`] is an actor owning the only [`ConnectionState`].
//! It opens sessions through a [`Transport`](crate::transport::Transport),
//! re-subscribes the contract filter on every connect, forwards logs into
//! the pipeline and reconnects with capped exponential backoff. A
//! [`ConnectionHandle`] is the external control surface used by the
//! supervisor and the HTTP health endpoint.
//!
//! State machine:
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//!      ^                        |                  |
//!      +-----------fail---------+---close/stall----+
//!
//! any --destroy--> Destroyed (terminal)
//! ```

mod handle;
mod manager;
mod state;

pub use handle::ConnectionHandle;
pub use manager::ConnectionManager;
pub use state::{ConnectionState, LinkStatus};
