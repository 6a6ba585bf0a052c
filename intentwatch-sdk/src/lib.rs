//! Shared types for intentwatch.
//!
//! Downstream consumers (webhook receivers, dashboards, health probes) depend
//! on this crate only; it carries no runtime or transport code.

pub mod objects;
