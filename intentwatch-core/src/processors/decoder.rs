//! EventDecoder processor.
//!
//! Classifies a raw log against the escrow schema. Decoding never fails:
//! anything that does not match degrades to `DecodedEvent::Unrecognized`
//! with a best-effort id taken from the third topic.

use crate::contract::abi::decode_event;
use crate::contract::events::{DecodedEvent, DecodedLog, Unrecognized};
use crate::events::RawLog;
use alloy_primitives::U256;
use kanau::processor::Processor;
use std::convert::Infallible;
use tracing::warn;

/// Topic slot read when a log cannot be decoded.
const INFERRED_ID_TOPIC: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct EventDecoder;

impl EventDecoder {
    pub fn decode(&self, log: &RawLog) -> DecodedLog {
        let event = match &log.malformed {
            Some(fault) => unrecognized(log, format!("malformed log: {fault}")),
            None => match decode_event(&log.topics, &log.data) {
                Ok(event) => event,
                Err(e) => unrecognized(log, e.to_string()),
            },
        };

        DecodedLog {
            event,
            tx_hash: log.transaction_hash,
            block_number: log.block_number,
        }
    }
}

fn unrecognized(log: &RawLog, reason: String) -> DecodedEvent {
    let signature = log.topics.first().copied();
    let inferred_id = log
        .topics
        .get(INFERRED_ID_TOPIC)
        .map(|topic| U256::from_be_bytes(topic.0));
    warn!(
        tx_hash = %log.transaction_hash,
        block = log.block_number,
        signature = ?signature,
        inferred_id = ?inferred_id,
        reason = %reason,
        "Unrecognized contract log"
    );
    DecodedEvent::Unrecognized(Unrecognized {
        signature,
        inferred_id,
        reason,
    })
}

impl Processor<RawLog> for EventDecoder {
    type Output = DecodedLog;
    type Error = Infallible;

    async fn process(&self, log: RawLog) -> Result<DecodedLog, Infallible> {
        Ok(self.decode(&log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::abi::EventKind;
    use crate::contract::abi::test_support::*;
    use alloy_primitives::{B256, Bytes};

    #[tokio::test]
    async fn test_decodes_known_event() {
        let log = pruned_log(B256::repeat_byte(0xbb), B256::repeat_byte(0x02), 5);
        let decoded = EventDecoder.process(log).await.unwrap();
        assert_eq!(decoded.event.name(), "IntentPruned");
        assert_eq!(decoded.tx_hash, B256::repeat_byte(0xbb));
        assert_eq!(decoded.block_number, 100);
    }

    #[test]
    fn test_unknown_signature_infers_id_from_third_topic() {
        let signature = B256::repeat_byte(0xde);
        let log = raw_log(
            vec![signature, B256::repeat_byte(0x01), uint_word(77)],
            Bytes::from_static(&[1, 2, 3]),
            B256::repeat_byte(0xcc),
            12,
        );

        let decoded = EventDecoder.decode(&log);
        let DecodedEvent::Unrecognized(unrecognized) = &decoded.event else {
            panic!("expected Unrecognized, got {:?}", decoded.event);
        };
        assert_eq!(unrecognized.signature, Some(signature));
        assert_eq!(unrecognized.inferred_id, Some(U256::from(77u64)));
        assert!(unrecognized.reason.contains("unknown event signature"));
        assert_eq!(decoded.event.deposit_id(), Some(U256::from(77u64)));
    }

    #[test]
    fn test_malformed_known_event_is_unrecognized() {
        // Correct signature, truncated data.
        let log = raw_log(
            vec![
                EventKind::IntentFulfilled.topic(),
                B256::repeat_byte(0x11),
                uint_word(3),
                address_word(alloy_primitives::Address::ZERO),
            ],
            encode_words(&[uint_word(1)]),
            B256::repeat_byte(0xcc),
            12,
        );

        let DecodedEvent::Unrecognized(unrecognized) = EventDecoder.decode(&log).event else {
            panic!("expected Unrecognized");
        };
        assert_eq!(
            unrecognized.signature,
            Some(EventKind::IntentFulfilled.topic())
        );
        assert_eq!(unrecognized.inferred_id, Some(U256::from(3u64)));
    }

    #[test]
    fn test_malformed_wire_log_skips_schema_decoding() {
        // Topics and data would decode, but the node sent a bad address.
        let mut log = pruned_log(B256::repeat_byte(0xbb), B256::repeat_byte(0x02), 5);
        log.malformed = Some("invalid address \"nope\"".to_string());

        let decoded = EventDecoder.decode(&log);
        let DecodedEvent::Unrecognized(unrecognized) = &decoded.event else {
            panic!("expected Unrecognized, got {:?}", decoded.event);
        };
        assert_eq!(unrecognized.signature, Some(EventKind::IntentPruned.topic()));
        assert_eq!(unrecognized.inferred_id, Some(U256::from(5u64)));
        assert!(unrecognized.reason.starts_with("malformed log"));
        assert_eq!(decoded.tx_hash, B256::repeat_byte(0xbb));
    }

    #[test]
    fn test_short_logs_have_no_inferred_id() {
        let empty = raw_log(vec![], Bytes::new(), B256::ZERO, 1);
        let DecodedEvent::Unrecognized(unrecognized) = EventDecoder.decode(&empty).event else {
            panic!("expected Unrecognized");
        };
        assert_eq!(unrecognized.signature, None);
        assert_eq!(unrecognized.inferred_id, None);
    }
}
