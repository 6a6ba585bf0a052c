//! Transaction correlation configuration.

use std::time::Duration;

/// Configuration of the transaction correlation window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationConfig {
    /// How long to wait after the first event of a transaction before
    /// deciding its outcomes.
    pub quiescence_window: Duration,
    /// How long an `IntentSignaled` quote is kept waiting for its
    /// fulfillment.
    pub quote_ttl: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            quiescence_window: Duration::from_millis(3000),
            quote_ttl: Duration::from_secs(60 * 60),
        }
    }
}
