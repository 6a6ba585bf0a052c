//! Runtime configuration types for intentwatch.
//!
//! These types represent the validated runtime configuration used by the
//! processors. Loading and validating the TOML file is handled by the server
//! crate.

mod connection;
mod correlation;

pub use connection::ConnectionConfig;
pub use correlation::CorrelationConfig;
