//! Escrow contract schema.
//!
//! - `events`: typed event structs and the decoded tagged union
//! - `abi`: static signature table and log decoding
//! - `catalog`: known currencies, verifiers and unit conversions

pub mod abi;
pub mod catalog;
pub mod events;

pub use abi::{DecodeError, EventKind, decode_event};
pub use events::{DecodedEvent, DecodedLog};
