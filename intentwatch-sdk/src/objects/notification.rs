//! Webhook payload types for canonical intent outcomes and contract events.
//!
//! Every on-chain quantity is carried as a decimal or `0x`-prefixed hex
//! string so receivers never lose precision on 256-bit values.

use serde::{Deserialize, Serialize};

/// Notification delivered to a webhook endpoint.
///
/// Serialized as an internally-tagged JSON object:
///
/// ```json
/// {"event_type":"intent_cancelled","intent_hash":"0x..","deposit_id":"42",..}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum NotificationPayload {
    /// An intent was fulfilled. Emitted once per intent, after the
    /// transaction's correlation window closed.
    IntentCompleted {
        intent_hash: String,
        deposit_id: String,
        verifier: String,
        /// Payment platform behind the verifier, when known.
        platform: Option<String>,
        owner: String,
        to: String,
        /// USDC amount with 6 decimals applied.
        amount: String,
        sustainability_fee: String,
        verifier_fee: String,
        /// Quote captured from the matching `IntentSignaled` event.
        quote: Option<IntentQuotePayload>,
        tx_hash: String,
        block_number: u64,
        timestamp: i64,
    },

    /// An intent was pruned and no fulfillment for it was seen in the same
    /// transaction.
    IntentCancelled {
        intent_hash: String,
        deposit_id: String,
        tx_hash: String,
        block_number: u64,
        timestamp: i64,
    },

    /// A log from the watched contract did not match the known event table.
    UnrecognizedEvent {
        /// Identifier read from the third topic, if the log had one.
        inferred_id: Option<String>,
        signature: Option<String>,
        reason: String,
        tx_hash: String,
        block_number: u64,
        timestamp: i64,
    },

    /// Any other decoded contract event, passed through by name.
    ContractEvent {
        name: String,
        deposit_id: Option<String>,
        tx_hash: String,
        block_number: u64,
        timestamp: i64,
    },
}

/// Rate information attached to a completed intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentQuotePayload {
    pub fiat_currency: String,
    /// ISO code of the fiat currency, when the hash is known.
    pub fiat_code: Option<String>,
    /// Conversion rate with 18 decimals applied.
    pub conversion_rate: String,
}

impl NotificationPayload {
    /// Transaction hash the notification refers to.
    pub fn tx_hash(&self) -> &str {
        match self {
            NotificationPayload::IntentCompleted { tx_hash, .. }
            | NotificationPayload::IntentCancelled { tx_hash, .. }
            | NotificationPayload::UnrecognizedEvent { tx_hash, .. }
            | NotificationPayload::ContractEvent { tx_hash, .. } => tx_hash,
        }
    }
}
