pub mod backoff;
pub mod timers;
