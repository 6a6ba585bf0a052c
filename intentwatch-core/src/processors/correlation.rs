//! Transaction correlation window.
//!
//! A batched transaction can prune and fulfill the same intent. Fulfillments
//! and prunes are therefore grouped by transaction hash and only decided
//! once the transaction has been quiet for the quiescence window:
//!
//! - an intent in both sets yields exactly one completion (fulfilled
//!   overrides pruned)
//! - an intent only in the pruned set yields one cancellation
//! - each transaction hash is finalized exactly once
//!
//! Finalization reasons over set membership, so arrival order within a
//! transaction does not matter. An armed window always fires.

use crate::config::CorrelationConfig;
use crate::contract::events::{IntentFulfilled, IntentPruned};
use crate::events::{
    CancelledIntent, CompletedIntent, CorrelationInput, CorrelationInputReceiver, IntentQuote,
    Notification, NotificationSender,
};
use crate::utils::timers::sleep_until_opt;
use alloy_primitives::B256;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Last observed record of an intent within one transaction.
#[derive(Debug, Clone)]
enum IntentRecord {
    Fulfilled(IntentFulfilled),
    Pruned(IntentPruned),
}

/// Outcomes collected for one transaction hash.
#[derive(Debug, Default)]
struct PendingTransaction {
    fulfilled: BTreeSet<B256>,
    pruned: BTreeSet<B256>,
    raw_intents: HashMap<B256, IntentRecord>,
    block_number: u64,
    scheduled: bool,
}

/// Single-writer store of pending transactions and their deadlines.
///
/// Time is passed in explicitly; [`CorrelationRunner`] drives it from the
/// tokio clock.
#[derive(Debug)]
pub struct CorrelationWindow {
    config: CorrelationConfig,
    pending: HashMap<B256, PendingTransaction>,
    /// Finalize deadlines in arming order. The window is fixed, so this is
    /// also deadline order.
    deadlines: VecDeque<(Instant, B256)>,
    quotes: HashMap<B256, (IntentQuote, Instant)>,
}

impl CorrelationWindow {
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            deadlines: VecDeque::new(),
            quotes: HashMap::new(),
        }
    }

    pub fn apply(&mut self, input: CorrelationInput, now: Instant) {
        match input {
            CorrelationInput::Signaled(quote) => self.record_signaled(quote, now),
            CorrelationInput::Fulfilled {
                tx_hash,
                block_number,
                intent,
            } => self.record_fulfilled(tx_hash, block_number, intent, now),
            CorrelationInput::Pruned {
                tx_hash,
                block_number,
                intent,
            } => self.record_pruned(tx_hash, block_number, intent, now),
        }
    }

    pub fn record_fulfilled(
        &mut self,
        tx_hash: B256,
        block_number: u64,
        intent: IntentFulfilled,
        now: Instant,
    ) {
        let entry = self.entry(tx_hash, block_number);
        entry.fulfilled.insert(intent.intent_hash);
        entry
            .raw_intents
            .insert(intent.intent_hash, IntentRecord::Fulfilled(intent));
        self.schedule_finalize(tx_hash, now);
    }

    /// Record a prune. Never replaces a fulfillment already recorded for the
    /// same intent.
    pub fn record_pruned(
        &mut self,
        tx_hash: B256,
        block_number: u64,
        intent: IntentPruned,
        now: Instant,
    ) {
        let entry = self.entry(tx_hash, block_number);
        entry.pruned.insert(intent.intent_hash);
        entry
            .raw_intents
            .entry(intent.intent_hash)
            .or_insert(IntentRecord::Pruned(intent));
        self.schedule_finalize(tx_hash, now);
    }

    /// Keep the quote of a signaled intent until its fulfillment arrives.
    pub fn record_signaled(&mut self, quote: IntentQuote, now: Instant) {
        let ttl = self.config.quote_ttl;
        self.quotes
            .retain(|_, (_, seen_at)| now.saturating_duration_since(*seen_at) < ttl);
        self.quotes.insert(quote.intent_hash, (quote, now));
    }

    fn entry(&mut self, tx_hash: B256, block_number: u64) -> &mut PendingTransaction {
        self.pending
            .entry(tx_hash)
            .or_insert_with(|| PendingTransaction {
                block_number,
                ..Default::default()
            })
    }

    /// Arm the finalize deadline of `tx_hash` unless it is already armed.
    fn schedule_finalize(&mut self, tx_hash: B256, now: Instant) {
        let Some(entry) = self.pending.get_mut(&tx_hash) else {
            return;
        };
        if entry.scheduled {
            return;
        }
        entry.scheduled = true;
        let deadline = now + self.config.quiescence_window;
        self.deadlines.push_back((deadline, tx_hash));
        debug!(%tx_hash, "Correlation window armed");
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.front().map(|(deadline, _)| *deadline)
    }

    /// Whether no window is armed.
    pub fn is_idle(&self) -> bool {
        self.deadlines.is_empty()
    }

    pub fn pending_transactions(&self) -> usize {
        self.pending.len()
    }

    pub fn cached_quotes(&self) -> usize {
        self.quotes.len()
    }

    /// Finalize every transaction whose deadline is at or before `now`.
    pub fn finalize_due(&mut self, now: Instant) -> Vec<Notification> {
        let mut notifications = Vec::new();
        while let Some((deadline, tx_hash)) = self.deadlines.front().copied() {
            if deadline > now {
                break;
            }
            self.deadlines.pop_front();
            notifications.extend(self.finalize(tx_hash));
        }
        notifications
    }

    /// Decide the canonical outcomes of one transaction and forget it.
    ///
    /// Cancellations come first, then completions, each in ascending intent
    /// hash order.
    fn finalize(&mut self, tx_hash: B256) -> Vec<Notification> {
        self.deadlines.retain(|(_, armed)| *armed != tx_hash);
        let Some(mut tx) = self.pending.remove(&tx_hash) else {
            return Vec::new();
        };

        let mut notifications = Vec::new();

        for intent_hash in &tx.pruned {
            if tx.fulfilled.contains(intent_hash) {
                info!(
                    %intent_hash,
                    %tx_hash,
                    "Cancellation suppressed, intent fulfilled in the same transaction"
                );
                continue;
            }
            match tx.raw_intents.remove(intent_hash) {
                Some(IntentRecord::Pruned(intent)) => {
                    info!(%intent_hash, %tx_hash, "Intent cancelled");
                    notifications.push(Notification::Cancelled(CancelledIntent {
                        intent,
                        tx_hash,
                        block_number: tx.block_number,
                    }));
                }
                _ => warn!(%intent_hash, %tx_hash, "Pruned intent without a prune record"),
            }
        }

        for intent_hash in &tx.fulfilled {
            match tx.raw_intents.remove(intent_hash) {
                Some(IntentRecord::Fulfilled(intent)) => {
                    let quote = self.quotes.remove(intent_hash).map(|(quote, _)| quote);
                    info!(
                        %intent_hash,
                        %tx_hash,
                        quoted = quote.is_some(),
                        "Intent completed"
                    );
                    notifications.push(Notification::Completed(CompletedIntent {
                        intent,
                        quote,
                        tx_hash,
                        block_number: tx.block_number,
                    }));
                }
                _ => warn!(%intent_hash, %tx_hash, "Fulfilled intent without a fulfillment record"),
            }
        }

        notifications
    }
}

/// Runs a [`CorrelationWindow`] against the tokio clock.
pub struct CorrelationRunner {
    window: CorrelationWindow,
    input_rx: CorrelationInputReceiver,
    notification_tx: NotificationSender,
}

impl CorrelationRunner {
    pub fn new(
        config: CorrelationConfig,
        input_rx: CorrelationInputReceiver,
        notification_tx: NotificationSender,
    ) -> Self {
        Self {
            window: CorrelationWindow::new(config),
            input_rx,
            notification_tx,
        }
    }

    /// Run until the input channel is closed and every armed window fired.
    pub async fn run(mut self) {
        info!("CorrelationRunner started");
        let mut input_open = true;

        loop {
            if !input_open && self.window.is_idle() {
                break;
            }

            tokio::select! {
                biased;

                _ = sleep_until_opt(self.window.next_deadline()) => {
                    for notification in self.window.finalize_due(Instant::now()) {
                        if let Err(e) = self.notification_tx.send(notification).await {
                            warn!(error = %e, "Notification relay is gone, outcome dropped");
                        }
                    }
                }

                input = self.input_rx.recv(), if input_open => match input {
                    Some(input) => self.window.apply(input, Instant::now()),
                    None => {
                        info!(
                            pending = self.window.pending_transactions(),
                            "CorrelationInput channel closed, draining armed windows"
                        );
                        input_open = false;
                    }
                },
            }
        }

        info!("CorrelationRunner shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{correlation_input_channel, notification_channel};
    use alloy_primitives::{Address, U256};
    use std::time::Duration;

    const WINDOW: Duration = Duration::from_millis(3000);

    fn fulfilled(intent_hash: B256) -> IntentFulfilled {
        IntentFulfilled {
            intent_hash,
            deposit_id: U256::from(1u64),
            verifier: Address::repeat_byte(0x76),
            owner: Address::repeat_byte(0x01),
            to: Address::repeat_byte(0x02),
            amount: U256::from(10_000_000u64),
            sustainability_fee: U256::ZERO,
            verifier_fee: U256::ZERO,
        }
    }

    fn pruned(intent_hash: B256) -> IntentPruned {
        IntentPruned {
            intent_hash,
            deposit_id: U256::from(1u64),
        }
    }

    fn quote(intent_hash: B256) -> IntentQuote {
        IntentQuote {
            intent_hash,
            fiat_currency: B256::repeat_byte(0xc4),
            conversion_rate: U256::from(1_000_000_000_000_000_000u64),
            verifier: Address::repeat_byte(0x76),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fulfilled_overrides_pruned_in_window() {
        let mut window = CorrelationWindow::new(CorrelationConfig::default());
        let tx = B256::repeat_byte(0xaa);
        let i1 = B256::repeat_byte(0x01);
        let t0 = Instant::now();

        window.record_pruned(tx, 10, pruned(i1), t0);
        window.record_fulfilled(tx, 10, fulfilled(i1), t0 + Duration::from_secs(1));

        assert_eq!(window.next_deadline(), Some(t0 + WINDOW));
        assert!(window.finalize_due(t0 + Duration::from_millis(2999)).is_empty());

        let outcomes = window.finalize_due(t0 + WINDOW);
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Notification::Completed(c) => {
                assert_eq!(c.intent.intent_hash, i1);
                assert_eq!(c.tx_hash, tx);
                assert_eq!(c.block_number, 10);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(window.pending_transactions(), 0);
        assert!(window.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_prune_cancels() {
        let mut window = CorrelationWindow::new(CorrelationConfig::default());
        let tx = B256::repeat_byte(0xbb);
        let i2 = B256::repeat_byte(0x02);
        let t0 = Instant::now();

        window.record_pruned(tx, 11, pruned(i2), t0);
        let outcomes = window.finalize_due(t0 + WINDOW);

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0],
            Notification::Cancelled(c) if c.intent.intent_hash == i2 && c.tx_hash == tx
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_never_replaces_fulfillment_record() {
        let mut window = CorrelationWindow::new(CorrelationConfig::default());
        let tx = B256::repeat_byte(0xaa);
        let i1 = B256::repeat_byte(0x01);
        let t0 = Instant::now();

        window.record_fulfilled(tx, 10, fulfilled(i1), t0);
        window.record_pruned(tx, 10, pruned(i1), t0);
        window.record_pruned(tx, 10, pruned(i1), t0);

        let outcomes = window.finalize(tx);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Notification::Completed(c) if c.intent.amount == U256::from(10_000_000u64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_forgets_queued_deadline() {
        let mut window = CorrelationWindow::new(CorrelationConfig::default());
        let tx = B256::repeat_byte(0xab);
        let t0 = Instant::now();

        window.record_pruned(tx, 10, pruned(B256::repeat_byte(0x01)), t0);
        assert_eq!(window.finalize(tx).len(), 1);
        assert!(window.is_idle());

        // The same hash seen again opens a fresh window.
        let t1 = t0 + Duration::from_secs(2);
        window.record_pruned(tx, 10, pruned(B256::repeat_byte(0x02)), t1);
        assert_eq!(window.next_deadline(), Some(t1 + WINDOW));
        assert!(window.finalize_due(t0 + WINDOW).is_empty());
        assert_eq!(window.pending_transactions(), 1);

        let outcomes = window.finalize_due(t1 + WINDOW);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            &outcomes[0],
            Notification::Cancelled(c) if c.intent.intent_hash == B256::repeat_byte(0x02)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_transaction_orders_outcomes() {
        let mut window = CorrelationWindow::new(CorrelationConfig::default());
        let tx = B256::repeat_byte(0xcc);
        let t0 = Instant::now();

        window.record_fulfilled(tx, 5, fulfilled(B256::repeat_byte(0x09)), t0);
        window.record_pruned(tx, 5, pruned(B256::repeat_byte(0x07)), t0);
        window.record_fulfilled(tx, 5, fulfilled(B256::repeat_byte(0x03)), t0);
        window.record_pruned(tx, 5, pruned(B256::repeat_byte(0x05)), t0);
        window.record_pruned(tx, 5, pruned(B256::repeat_byte(0x09)), t0);

        let outcomes = window.finalize_due(t0 + WINDOW);
        let summary: Vec<(&str, u8)> = outcomes
            .iter()
            .map(|n| match n {
                Notification::Cancelled(c) => ("cancelled", c.intent.intent_hash[0]),
                Notification::Completed(c) => ("completed", c.intent.intent_hash[0]),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("cancelled", 0x05),
                ("cancelled", 0x07),
                ("completed", 0x03),
                ("completed", 0x09),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_events_schedule_once() {
        let mut window = CorrelationWindow::new(CorrelationConfig::default());
        let tx = B256::repeat_byte(0xaa);
        let t0 = Instant::now();

        for i in 0..10u64 {
            let at = t0 + Duration::from_millis(i * 200);
            window.record_pruned(tx, 1, pruned(B256::repeat_byte(0x01)), at);
            window.record_fulfilled(tx, 1, fulfilled(B256::repeat_byte(0x02)), at);
        }

        assert_eq!(window.deadlines.len(), 1);
        assert_eq!(window.finalize_due(t0 + WINDOW).len(), 2);
        assert!(window.finalize_due(t0 + WINDOW * 10).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_after_finalize_open_a_new_window() {
        let mut window = CorrelationWindow::new(CorrelationConfig::default());
        let tx = B256::repeat_byte(0xaa);
        let t0 = Instant::now();

        window.record_pruned(tx, 1, pruned(B256::repeat_byte(0x01)), t0);
        assert_eq!(window.finalize_due(t0 + WINDOW).len(), 1);

        let late = t0 + WINDOW + Duration::from_secs(1);
        window.record_fulfilled(tx, 1, fulfilled(B256::repeat_byte(0x01)), late);
        assert_eq!(window.next_deadline(), Some(late + WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_attached_and_consumed() {
        let mut window = CorrelationWindow::new(CorrelationConfig::default());
        let i1 = B256::repeat_byte(0x01);
        let t0 = Instant::now();

        window.record_signaled(quote(i1), t0);
        window.record_fulfilled(B256::repeat_byte(0xaa), 1, fulfilled(i1), t0);
        let outcomes = window.finalize_due(t0 + WINDOW);

        assert!(matches!(
            &outcomes[0],
            Notification::Completed(c) if c.quote == Some(quote(i1))
        ));
        assert_eq!(window.cached_quotes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_quotes_are_evicted() {
        let config = CorrelationConfig::default();
        let ttl = config.quote_ttl;
        let mut window = CorrelationWindow::new(config);
        let t0 = Instant::now();

        window.record_signaled(quote(B256::repeat_byte(0x01)), t0);
        window.record_signaled(quote(B256::repeat_byte(0x02)), t0 + ttl);
        assert_eq!(window.cached_quotes(), 1);

        window.record_fulfilled(B256::repeat_byte(0xaa), 1, fulfilled(B256::repeat_byte(0x01)), t0 + ttl);
        let outcomes = window.finalize_due(t0 + ttl + WINDOW);
        assert!(matches!(&outcomes[0], Notification::Completed(c) if c.quote.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_emits_single_completion_after_window() {
        let (input_tx, input_rx) = correlation_input_channel();
        let (notif_tx, mut notif_rx) = notification_channel();
        let task = tokio::spawn(
            CorrelationRunner::new(CorrelationConfig::default(), input_rx, notif_tx).run(),
        );

        let tx = B256::repeat_byte(0xaa);
        let i1 = B256::repeat_byte(0x01);
        let t0 = Instant::now();

        input_tx
            .send(CorrelationInput::Pruned {
                tx_hash: tx,
                block_number: 3,
                intent: pruned(i1),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        input_tx
            .send(CorrelationInput::Fulfilled {
                tx_hash: tx,
                block_number: 3,
                intent: fulfilled(i1),
            })
            .await
            .unwrap();

        let first = notif_rx.recv().await.unwrap();
        let elapsed = t0.elapsed();
        assert!(matches!(first, Notification::Completed(ref c) if c.intent.intent_hash == i1));
        assert!(elapsed >= WINDOW && elapsed < WINDOW + Duration::from_millis(10));

        drop(input_tx);
        task.await.unwrap();
        assert!(notif_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_drains_armed_windows_on_close() {
        let (input_tx, input_rx) = correlation_input_channel();
        let (notif_tx, mut notif_rx) = notification_channel();
        let task = tokio::spawn(
            CorrelationRunner::new(CorrelationConfig::default(), input_rx, notif_tx).run(),
        );

        let t0 = Instant::now();
        input_tx
            .send(CorrelationInput::Pruned {
                tx_hash: B256::repeat_byte(0xbb),
                block_number: 4,
                intent: pruned(B256::repeat_byte(0x02)),
            })
            .await
            .unwrap();
        drop(input_tx);

        task.await.unwrap();
        assert!(t0.elapsed() >= WINDOW);
        assert!(matches!(
            notif_rx.recv().await,
            Some(Notification::Cancelled(c)) if c.intent.intent_hash == B256::repeat_byte(0x02)
        ));
        assert!(notif_rx.recv().await.is_none());
    }
}
