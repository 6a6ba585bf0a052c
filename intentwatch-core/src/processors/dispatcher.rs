//! EventDispatcher processor.
//!
//! The EventDispatcher is responsible for:
//! - Receiving `RawLog` from the connection manager
//! - Skipping logs removed by a re-organisation
//! - Decoding them with the [`EventDecoder`]
//! - Routing intent fulfillments, prunes and quotes to the correlation window
//! - Passing unrecognized logs and every other event to the relay
//!
//! Routing only enqueues; slow consumers never hold up the next log.

use super::decoder::EventDecoder;
use crate::contract::events::{DecodedEvent, DecodedLog};
use crate::events::{
    CorrelationInput, CorrelationInputSender, IntentQuote, Notification, NotificationSender,
    RawLog, RawLogReceiver, UnrecognizedLog,
};
use kanau::processor::Processor;
use tracing::{debug, info, warn};

pub struct EventDispatcher {
    decoder: EventDecoder,
    log_rx: RawLogReceiver,
    correlation_tx: CorrelationInputSender,
    notification_tx: NotificationSender,
}

impl EventDispatcher {
    pub fn new(
        log_rx: RawLogReceiver,
        correlation_tx: CorrelationInputSender,
        notification_tx: NotificationSender,
    ) -> Self {
        Self {
            decoder: EventDecoder,
            log_rx,
            correlation_tx,
            notification_tx,
        }
    }

    /// Run until the raw log channel closes.
    pub async fn run(mut self) {
        info!("EventDispatcher started");

        while let Some(log) = self.log_rx.recv().await {
            self.dispatch(log).await;
        }

        info!("RawLog channel closed, EventDispatcher shutdown complete");
    }

    async fn dispatch(&self, log: RawLog) {
        if log.removed {
            warn!(
                tx_hash = %log.transaction_hash,
                block = log.block_number,
                "Skipping log removed by chain re-organisation"
            );
            return;
        }

        let decoded = match self.decoder.process(log).await {
            Ok(decoded) => decoded,
            Err(never) => match never {},
        };

        let DecodedLog {
            event,
            tx_hash,
            block_number,
        } = decoded;

        match event {
            DecodedEvent::IntentSignaled(signaled) => {
                info!(
                    intent_hash = %signaled.intent_hash,
                    deposit_id = %signaled.deposit_id,
                    %tx_hash,
                    "Intent signaled"
                );
                self.correlate(CorrelationInput::Signaled(IntentQuote::from(&signaled)))
                    .await;
                self.notify(Notification::Event(DecodedLog {
                    event: DecodedEvent::IntentSignaled(signaled),
                    tx_hash,
                    block_number,
                }))
                .await;
            }
            DecodedEvent::IntentFulfilled(intent) => {
                info!(
                    intent_hash = %intent.intent_hash,
                    deposit_id = %intent.deposit_id,
                    %tx_hash,
                    "Intent fulfilled"
                );
                self.correlate(CorrelationInput::Fulfilled {
                    tx_hash,
                    block_number,
                    intent,
                })
                .await;
            }
            DecodedEvent::IntentPruned(intent) => {
                info!(
                    intent_hash = %intent.intent_hash,
                    deposit_id = %intent.deposit_id,
                    %tx_hash,
                    "Intent pruned"
                );
                self.correlate(CorrelationInput::Pruned {
                    tx_hash,
                    block_number,
                    intent,
                })
                .await;
            }
            DecodedEvent::Unrecognized(unrecognized) => {
                self.notify(Notification::Unrecognized(UnrecognizedLog {
                    inferred_id: unrecognized.inferred_id,
                    signature: unrecognized.signature,
                    reason: unrecognized.reason,
                    tx_hash,
                    block_number,
                }))
                .await;
            }
            event => {
                debug!(event = event.name(), %tx_hash, "Contract event");
                self.notify(Notification::Event(DecodedLog {
                    event,
                    tx_hash,
                    block_number,
                }))
                .await;
            }
        }
    }

    async fn correlate(&self, input: CorrelationInput) {
        if let Err(e) = self.correlation_tx.send(input).await {
            warn!(error = %e, "Correlation window is gone, input dropped");
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notification_tx.send(notification).await {
            warn!(error = %e, "Notification relay is gone, notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::abi::test_support::*;
    use crate::events::{correlation_input_channel, notification_channel, raw_log_channel};
    use alloy_primitives::{B256, Bytes, U256};

    #[tokio::test]
    async fn test_routes_by_event_kind() {
        let (log_tx, log_rx) = raw_log_channel();
        let (corr_tx, mut corr_rx) = correlation_input_channel();
        let (notif_tx, mut notif_rx) = notification_channel();
        let task = tokio::spawn(EventDispatcher::new(log_rx, corr_tx, notif_tx).run());

        let tx = B256::repeat_byte(0xaa);
        log_tx
            .send(signaled_log(tx, B256::repeat_byte(0x01), 1))
            .await
            .unwrap();
        log_tx
            .send(fulfilled_log(tx, B256::repeat_byte(0x01), 1))
            .await
            .unwrap();
        log_tx
            .send(pruned_log(tx, B256::repeat_byte(0x02), 1))
            .await
            .unwrap();
        drop(log_tx);
        task.await.unwrap();

        assert!(matches!(
            corr_rx.recv().await,
            Some(CorrelationInput::Signaled(quote)) if quote.intent_hash == B256::repeat_byte(0x01)
        ));
        assert!(matches!(
            corr_rx.recv().await,
            Some(CorrelationInput::Fulfilled { tx_hash, .. }) if tx_hash == tx
        ));
        assert!(matches!(
            corr_rx.recv().await,
            Some(CorrelationInput::Pruned { intent, .. }) if intent.intent_hash == B256::repeat_byte(0x02)
        ));
        assert!(corr_rx.recv().await.is_none());

        // Only the signal is passed through as a plain event.
        match notif_rx.recv().await {
            Some(Notification::Event(log)) => assert_eq!(log.event.name(), "IntentSignaled"),
            other => panic!("unexpected notification: {other:?}"),
        }
        assert!(notif_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unrecognized_log_does_not_stop_stream() {
        let (log_tx, log_rx) = raw_log_channel();
        let (corr_tx, mut corr_rx) = correlation_input_channel();
        let (notif_tx, mut notif_rx) = notification_channel();
        let task = tokio::spawn(EventDispatcher::new(log_rx, corr_tx, notif_tx).run());

        let garbage = raw_log(
            vec![B256::repeat_byte(0xde), B256::repeat_byte(0xad), uint_word(4242)],
            Bytes::from_static(b"\x00\x01"),
            B256::repeat_byte(0xdd),
            50,
        );
        log_tx.send(garbage).await.unwrap();
        log_tx
            .send(pruned_log(B256::repeat_byte(0xee), B256::repeat_byte(0x03), 9))
            .await
            .unwrap();
        drop(log_tx);
        task.await.unwrap();

        match notif_rx.recv().await {
            Some(Notification::Unrecognized(u)) => {
                assert_eq!(u.inferred_id, Some(U256::from(4242u64)));
                assert_eq!(u.signature, Some(B256::repeat_byte(0xde)));
                assert_eq!(u.tx_hash, B256::repeat_byte(0xdd));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
        assert!(matches!(
            corr_rx.recv().await,
            Some(CorrelationInput::Pruned { tx_hash, .. }) if tx_hash == B256::repeat_byte(0xee)
        ));
    }

    #[tokio::test]
    async fn test_removed_logs_are_skipped() {
        let (log_tx, log_rx) = raw_log_channel();
        let (corr_tx, mut corr_rx) = correlation_input_channel();
        let (notif_tx, _notif_rx) = notification_channel();
        let task = tokio::spawn(EventDispatcher::new(log_rx, corr_tx, notif_tx).run());

        let mut log = pruned_log(B256::repeat_byte(0xbb), B256::repeat_byte(0x02), 1);
        log.removed = true;
        log_tx.send(log).await.unwrap();
        drop(log_tx);
        task.await.unwrap();

        assert!(corr_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_other_events_pass_through() {
        let (log_tx, log_rx) = raw_log_channel();
        let (corr_tx, _corr_rx) = correlation_input_channel();
        let (notif_tx, mut notif_rx) = notification_channel();
        let task = tokio::spawn(EventDispatcher::new(log_rx, corr_tx, notif_tx).run());

        let closed = raw_log(
            vec![crate::contract::abi::EventKind::DepositClosed.topic()],
            encode_words(&[uint_word(11), address_word(alloy_primitives::Address::repeat_byte(0x44))]),
            B256::repeat_byte(0x10),
            7,
        );
        log_tx.send(closed).await.unwrap();
        drop(log_tx);
        task.await.unwrap();

        match notif_rx.recv().await {
            Some(Notification::Event(log)) => {
                assert_eq!(log.event.name(), "DepositClosed");
                assert_eq!(log.event.deposit_id(), Some(U256::from(11u64)));
                assert_eq!(log.block_number, 7);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }
}
