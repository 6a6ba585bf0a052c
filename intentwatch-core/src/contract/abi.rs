//! Static signature table and log decoding for the escrow contract.
//!
//! Every event the contract (and the entry point bundling its calls) emits
//! is listed in [`EventKind`]. A log is matched by its first topic, then its
//! indexed topics and data words are read according to the event layout.
//! All event parameters are static ABI types, so the data section is a flat
//! sequence of 32-byte words.

use crate::contract::events::{
    DecodedEvent, DepositClosed, DepositCurrencyAdded, DepositRateUpdated, DepositReceived,
    DepositVerifierAdded, DepositWithdrawn, IntentFulfilled, IntentPruned, IntentSignaled,
    UserOperation,
};
use alloy_primitives::{Address, B256, U256, keccak256};
use lazy_static::lazy_static;
use std::collections::HashMap;
use thiserror::Error;

const WORD: usize = 32;

/// Errors that make a log fall back to `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Anonymous log without a signature topic
    #[error("log has no topics")]
    MissingSignature,

    /// First topic is not in the signature table
    #[error("unknown event signature {0}")]
    UnknownSignature(B256),

    /// Indexed parameter count does not match the event layout
    #[error("{event} expects {expected} topics, got {actual}")]
    TopicCount {
        event: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Data section is shorter than the event layout
    #[error("{event} expects {expected} data bytes, got {actual}")]
    DataLength {
        event: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Every event the watcher knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    IntentSignaled,
    IntentFulfilled,
    IntentPruned,
    DepositReceived,
    DepositCurrencyAdded,
    DepositVerifierAdded,
    DepositWithdrawn,
    DepositClosed,
    DepositCurrencyRateUpdated,
    DepositConversionRateUpdated,
    BeforeExecution,
    UserOperationEvent,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::IntentSignaled,
        EventKind::IntentFulfilled,
        EventKind::IntentPruned,
        EventKind::DepositReceived,
        EventKind::DepositCurrencyAdded,
        EventKind::DepositVerifierAdded,
        EventKind::DepositWithdrawn,
        EventKind::DepositClosed,
        EventKind::DepositCurrencyRateUpdated,
        EventKind::DepositConversionRateUpdated,
        EventKind::BeforeExecution,
        EventKind::UserOperationEvent,
    ];

    /// Canonical ABI signature.
    pub fn signature(self) -> &'static str {
        match self {
            EventKind::IntentSignaled => {
                "IntentSignaled(bytes32,uint256,address,address,address,uint256,bytes32,uint256,uint256)"
            }
            EventKind::IntentFulfilled => {
                "IntentFulfilled(bytes32,uint256,address,address,address,uint256,uint256,uint256)"
            }
            EventKind::IntentPruned => "IntentPruned(bytes32,uint256)",
            EventKind::DepositReceived => {
                "DepositReceived(uint256,address,address,uint256,(uint256,uint256))"
            }
            EventKind::DepositCurrencyAdded => "DepositCurrencyAdded(uint256,address,bytes32,uint256)",
            EventKind::DepositVerifierAdded => "DepositVerifierAdded(uint256,address,bytes32,address)",
            EventKind::DepositWithdrawn => "DepositWithdrawn(uint256,address,uint256)",
            EventKind::DepositClosed => "DepositClosed(uint256,address)",
            EventKind::DepositCurrencyRateUpdated => {
                "DepositCurrencyRateUpdated(uint256,address,bytes32,uint256)"
            }
            EventKind::DepositConversionRateUpdated => {
                "DepositConversionRateUpdated(uint256,address,bytes32,uint256)"
            }
            EventKind::BeforeExecution => "BeforeExecution()",
            EventKind::UserOperationEvent => {
                "UserOperationEvent(bytes32,address,address,uint256,bool,uint256,uint256)"
            }
        }
    }

    /// Event name, the signature up to the parameter list.
    pub fn name(self) -> &'static str {
        let signature = self.signature();
        signature.split('(').next().unwrap_or(signature)
    }

    /// First topic of logs of this kind.
    pub fn topic(self) -> B256 {
        keccak256(self.signature().as_bytes())
    }

    /// Number of indexed parameters and of 32-byte data words.
    fn layout(self) -> (usize, usize) {
        match self {
            EventKind::IntentSignaled => (3, 6),
            EventKind::IntentFulfilled => (3, 5),
            EventKind::IntentPruned => (2, 0),
            EventKind::DepositReceived => (3, 3),
            EventKind::DepositCurrencyAdded => (3, 1),
            EventKind::DepositVerifierAdded => (3, 1),
            EventKind::DepositWithdrawn => (2, 1),
            EventKind::DepositClosed => (0, 2),
            EventKind::DepositCurrencyRateUpdated => (3, 1),
            EventKind::DepositConversionRateUpdated => (3, 1),
            EventKind::BeforeExecution => (0, 0),
            EventKind::UserOperationEvent => (3, 4),
        }
    }
}

lazy_static! {
    static ref SIGNATURE_TABLE: HashMap<B256, EventKind> = EventKind::ALL
        .iter()
        .map(|kind| (kind.topic(), *kind))
        .collect();
}

/// Look up the event kind for a signature topic.
pub fn lookup(signature: &B256) -> Option<EventKind> {
    SIGNATURE_TABLE.get(signature).copied()
}

/// 32-byte slots of either the indexed topics or the data section.
struct Slots<'a> {
    words: &'a [u8],
}

impl<'a> Slots<'a> {
    fn data(data: &'a [u8]) -> Self {
        Self { words: data }
    }

    fn word(&self, index: usize) -> B256 {
        B256::from_slice(&self.words[index * WORD..(index + 1) * WORD])
    }

    fn uint(&self, index: usize) -> U256 {
        U256::from_be_bytes(self.word(index).0)
    }

    fn address(&self, index: usize) -> Address {
        Address::from_word(self.word(index))
    }

    fn boolean(&self, index: usize) -> bool {
        !self.word(index).is_zero()
    }
}

struct Topics<'a>(&'a [B256]);

impl Topics<'_> {
    fn word(&self, index: usize) -> B256 {
        self.0[index]
    }

    fn uint(&self, index: usize) -> U256 {
        U256::from_be_bytes(self.0[index].0)
    }

    fn address(&self, index: usize) -> Address {
        Address::from_word(self.0[index])
    }
}

/// Decode a log against the escrow schema.
///
/// `topics` includes the signature topic.
pub fn decode_event(topics: &[B256], data: &[u8]) -> Result<DecodedEvent, DecodeError> {
    let signature = topics.first().ok_or(DecodeError::MissingSignature)?;
    let kind = lookup(signature).ok_or(DecodeError::UnknownSignature(*signature))?;

    let (indexed, words) = kind.layout();
    if topics.len() != indexed + 1 {
        return Err(DecodeError::TopicCount {
            event: kind.name(),
            expected: indexed + 1,
            actual: topics.len(),
        });
    }
    if data.len() < words * WORD {
        return Err(DecodeError::DataLength {
            event: kind.name(),
            expected: words * WORD,
            actual: data.len(),
        });
    }

    let t = Topics(&topics[1..]);
    let d = Slots::data(data);

    let event = match kind {
        EventKind::IntentSignaled => DecodedEvent::IntentSignaled(IntentSignaled {
            intent_hash: t.word(0),
            deposit_id: t.uint(1),
            verifier: t.address(2),
            owner: d.address(0),
            to: d.address(1),
            amount: d.uint(2),
            fiat_currency: d.word(3),
            conversion_rate: d.uint(4),
            timestamp: d.uint(5),
        }),
        EventKind::IntentFulfilled => DecodedEvent::IntentFulfilled(IntentFulfilled {
            intent_hash: t.word(0),
            deposit_id: t.uint(1),
            verifier: t.address(2),
            owner: d.address(0),
            to: d.address(1),
            amount: d.uint(2),
            sustainability_fee: d.uint(3),
            verifier_fee: d.uint(4),
        }),
        EventKind::IntentPruned => DecodedEvent::IntentPruned(IntentPruned {
            intent_hash: t.word(0),
            deposit_id: t.uint(1),
        }),
        EventKind::DepositReceived => DecodedEvent::DepositReceived(DepositReceived {
            deposit_id: t.uint(0),
            depositor: t.address(1),
            token: t.address(2),
            amount: d.uint(0),
            intent_amount_min: d.uint(1),
            intent_amount_max: d.uint(2),
        }),
        EventKind::DepositCurrencyAdded => {
            DecodedEvent::DepositCurrencyAdded(DepositCurrencyAdded {
                deposit_id: t.uint(0),
                verifier: t.address(1),
                currency: t.word(2),
                conversion_rate: d.uint(0),
            })
        }
        EventKind::DepositVerifierAdded => {
            DecodedEvent::DepositVerifierAdded(DepositVerifierAdded {
                deposit_id: t.uint(0),
                verifier: t.address(1),
                payee_details_hash: t.word(2),
                intent_gating_service: d.address(0),
            })
        }
        EventKind::DepositWithdrawn => DecodedEvent::DepositWithdrawn(DepositWithdrawn {
            deposit_id: t.uint(0),
            depositor: t.address(1),
            amount: d.uint(0),
        }),
        EventKind::DepositClosed => DecodedEvent::DepositClosed(DepositClosed {
            deposit_id: d.uint(0),
            depositor: d.address(1),
        }),
        EventKind::DepositCurrencyRateUpdated => {
            DecodedEvent::DepositCurrencyRateUpdated(rate_updated(&t, &d))
        }
        EventKind::DepositConversionRateUpdated => {
            DecodedEvent::DepositConversionRateUpdated(rate_updated(&t, &d))
        }
        EventKind::BeforeExecution => DecodedEvent::BeforeExecution,
        EventKind::UserOperationEvent => DecodedEvent::UserOperationEvent(UserOperation {
            user_op_hash: t.word(0),
            sender: t.address(1),
            paymaster: t.address(2),
            nonce: d.uint(0),
            success: d.boolean(1),
            actual_gas_cost: d.uint(2),
            actual_gas_used: d.uint(3),
        }),
    };

    Ok(event)
}

fn rate_updated(t: &Topics<'_>, d: &Slots<'_>) -> DepositRateUpdated {
    DepositRateUpdated {
        deposit_id: t.uint(0),
        verifier: t.address(1),
        currency: t.word(2),
        conversion_rate: d.uint(0),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Log encoding helpers shared by the decoder and pipeline tests.

    use super::EventKind;
    use crate::events::RawLog;
    use alloy_primitives::{Address, B256, Bytes, U256};
    use smallvec::SmallVec;

    pub fn uint_word(value: u64) -> B256 {
        B256::from(U256::from(value).to_be_bytes::<32>())
    }

    pub fn address_word(address: Address) -> B256 {
        address.into_word()
    }

    pub fn encode_words(words: &[B256]) -> Bytes {
        let mut data = Vec::with_capacity(words.len() * 32);
        for word in words {
            data.extend_from_slice(word.as_slice());
        }
        Bytes::from(data)
    }

    pub fn raw_log(topics: Vec<B256>, data: Bytes, tx_hash: B256, block_number: u64) -> RawLog {
        RawLog {
            address: Address::repeat_byte(0xca),
            topics: SmallVec::from_vec(topics),
            data,
            block_number,
            transaction_hash: tx_hash,
            removed: false,
            malformed: None,
        }
    }

    pub fn fulfilled_log(tx_hash: B256, intent_hash: B256, deposit_id: u64) -> RawLog {
        raw_log(
            vec![
                EventKind::IntentFulfilled.topic(),
                intent_hash,
                uint_word(deposit_id),
                address_word(Address::repeat_byte(0x76)),
            ],
            encode_words(&[
                address_word(Address::repeat_byte(0x01)),
                address_word(Address::repeat_byte(0x02)),
                uint_word(25_000_000),
                uint_word(250_000),
                uint_word(0),
            ]),
            tx_hash,
            100,
        )
    }

    pub fn pruned_log(tx_hash: B256, intent_hash: B256, deposit_id: u64) -> RawLog {
        raw_log(
            vec![EventKind::IntentPruned.topic(), intent_hash, uint_word(deposit_id)],
            Bytes::new(),
            tx_hash,
            100,
        )
    }

    pub fn signaled_log(tx_hash: B256, intent_hash: B256, deposit_id: u64) -> RawLog {
        raw_log(
            vec![
                EventKind::IntentSignaled.topic(),
                intent_hash,
                uint_word(deposit_id),
                address_word(Address::repeat_byte(0x76)),
            ],
            encode_words(&[
                address_word(Address::repeat_byte(0x01)),
                address_word(Address::repeat_byte(0x02)),
                uint_word(25_000_000),
                B256::repeat_byte(0xc4),
                uint_word(1_000_000_000_000_000_000),
                uint_word(1_700_000_000),
            ]),
            tx_hash,
            99,
        )
    }
}
