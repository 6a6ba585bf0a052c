//! Event type definitions for the notification pipeline.
//!
//! Raw logs are ephemeral: produced by the transport, consumed once by the
//! decoder and never stored. Everything downstream carries typed values.

use crate::contract::events::{DecodedLog, IntentFulfilled, IntentPruned, IntentSignaled};
use alloy_primitives::{Address, B256, Bytes, U256};
use smallvec::SmallVec;

/// An undecoded log emitted by the watched contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: SmallVec<[B256; 4]>,
    pub data: Bytes,
    pub block_number: u64,
    pub transaction_hash: B256,
    /// Set by the node when the log was dropped by a chain re-organisation.
    pub removed: bool,
    /// Fields the node sent that could not be parsed. Such a log carries
    /// only what did parse; topics stop at the first bad one.
    pub malformed: Option<String>,
}

/// Input of the transaction correlation window.
#[derive(Debug, Clone)]
pub enum CorrelationInput {
    /// Rate details of a freshly signaled intent.
    Signaled(IntentQuote),
    /// An intent was fulfilled in `tx_hash`.
    Fulfilled {
        tx_hash: B256,
        block_number: u64,
        intent: IntentFulfilled,
    },
    /// An intent was pruned in `tx_hash`.
    Pruned {
        tx_hash: B256,
        block_number: u64,
        intent: IntentPruned,
    },
}

/// Quote details captured from `IntentSignaled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentQuote {
    pub intent_hash: B256,
    pub fiat_currency: B256,
    pub conversion_rate: U256,
    pub verifier: Address,
}

impl From<&IntentSignaled> for IntentQuote {
    fn from(event: &IntentSignaled) -> Self {
        Self {
            intent_hash: event.intent_hash,
            fiat_currency: event.fiat_currency,
            conversion_rate: event.conversion_rate,
            verifier: event.verifier,
        }
    }
}

/// Canonical completion outcome of an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedIntent {
    pub intent: IntentFulfilled,
    /// Quote from the matching `IntentSignaled`, if it was observed.
    pub quote: Option<IntentQuote>,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Canonical cancellation outcome of an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledIntent {
    pub intent: IntentPruned,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// A log that failed schema matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedLog {
    /// Identifier read from the third topic slot.
    pub inferred_id: Option<U256>,
    /// First topic of the log.
    pub signature: Option<B256>,
    /// Why decoding failed.
    pub reason: String,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Events delivered to the downstream consumers.
#[derive(Debug, Clone)]
pub enum Notification {
    /// An intent was fulfilled.
    Completed(CompletedIntent),
    /// An intent was cancelled without a fulfillment in the same transaction.
    Cancelled(CancelledIntent),
    /// A log could not be decoded.
    Unrecognized(UnrecognizedLog),
    /// Any other decoded event, passed through unchanged.
    Event(DecodedLog),
}

impl Notification {
    /// Transaction the notification originates from.
    pub fn tx_hash(&self) -> B256 {
        match self {
            Notification::Completed(c) => c.tx_hash,
            Notification::Cancelled(c) => c.tx_hash,
            Notification::Unrecognized(u) => u.tx_hash,
            Notification::Event(e) => e.tx_hash,
        }
    }
}
