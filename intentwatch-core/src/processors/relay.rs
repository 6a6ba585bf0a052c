//! NotificationRelay processor.
//!
//! Fans every notification out to the configured consumers. Each consumer
//! has its own bounded queue and delivery task, so a slow or failing
//! consumer never holds up the others or the pipeline. When a consumer's
//! queue is full the notification is dropped for that consumer only.

use crate::consumers::NotificationConsumer;
use crate::events::{DEFAULT_CHANNEL_BUFFER, Notification, NotificationReceiver};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub struct NotificationRelay {
    notification_rx: NotificationReceiver,
    consumers: Vec<Arc<dyn NotificationConsumer>>,
}

/// Queue feeding one consumer's delivery task.
struct ConsumerQueue {
    name: &'static str,
    tx: mpsc::Sender<Arc<Notification>>,
    dropped: u64,
}

impl NotificationRelay {
    pub fn new(
        notification_rx: NotificationReceiver,
        consumers: Vec<Arc<dyn NotificationConsumer>>,
    ) -> Self {
        Self {
            notification_rx,
            consumers,
        }
    }

    /// Run until every notification sender is dropped and every consumer
    /// has worked through its queue.
    pub async fn run(mut self) {
        info!(consumers = self.consumers.len(), "NotificationRelay started");

        let mut workers = JoinSet::new();
        let mut queues: Vec<ConsumerQueue> = self
            .consumers
            .drain(..)
            .map(|consumer| {
                let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
                let name = consumer.name();
                workers.spawn(deliver_all(consumer, rx));
                ConsumerQueue {
                    name,
                    tx,
                    dropped: 0,
                }
            })
            .collect();

        while let Some(notification) = self.notification_rx.recv().await {
            debug!(tx_hash = %notification.tx_hash(), "Relaying notification");
            let notification = Arc::new(notification);
            for queue in &mut queues {
                enqueue(queue, &notification);
            }
        }

        info!("Notification channel closed, draining consumer queues");
        drop(queues);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Consumer task failed");
            }
        }

        info!("NotificationRelay shutdown complete");
    }
}

fn enqueue(queue: &mut ConsumerQueue, notification: &Arc<Notification>) {
    match queue.tx.try_send(Arc::clone(notification)) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            queue.dropped += 1;
            error!(
                consumer = queue.name,
                tx_hash = %notification.tx_hash(),
                dropped = queue.dropped,
                "Consumer queue full, notification dropped"
            );
        }
        Err(TrySendError::Closed(_)) => {
            warn!(consumer = queue.name, "Consumer task gone, notification dropped");
        }
    }
}

async fn deliver_all(
    consumer: Arc<dyn NotificationConsumer>,
    mut rx: mpsc::Receiver<Arc<Notification>>,
) {
    while let Some(notification) = rx.recv().await {
        deliver(consumer.as_ref(), &notification).await;
    }
}

async fn deliver(consumer: &dyn NotificationConsumer, notification: &Notification) {
    let result = match notification {
        Notification::Completed(completed) => consumer.on_completed(completed).await,
        Notification::Cancelled(cancelled) => consumer.on_cancelled(cancelled).await,
        Notification::Unrecognized(unrecognized) => consumer.on_unrecognized(unrecognized).await,
        Notification::Event(event) => consumer.on_event(event).await,
    };

    if let Err(e) = result {
        warn!(
            consumer = consumer.name(),
            tx_hash = %notification.tx_hash(),
            error = %e,
            "Consumer failed to handle notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::ConsumerError;
    use crate::contract::events::{DecodedLog, IntentPruned};
    use crate::events::{CancelledIntent, CompletedIntent, UnrecognizedLog, notification_channel};
    use alloy_primitives::{B256, U256};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    impl Recorder {
        fn record(&self, what: &'static str) -> Result<(), ConsumerError> {
            self.seen.lock().unwrap().push(what);
            if self.fail {
                Err(ConsumerError::DeliveryFailed {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl NotificationConsumer for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn on_completed(&self, _: &CompletedIntent) -> Result<(), ConsumerError> {
            self.record("completed")
        }

        async fn on_cancelled(&self, _: &CancelledIntent) -> Result<(), ConsumerError> {
            self.record("cancelled")
        }

        async fn on_unrecognized(&self, _: &UnrecognizedLog) -> Result<(), ConsumerError> {
            self.record("unrecognized")
        }

        async fn on_event(&self, _: &DecodedLog) -> Result<(), ConsumerError> {
            self.record("event")
        }
    }

    fn cancelled() -> Notification {
        Notification::Cancelled(CancelledIntent {
            intent: IntentPruned {
                intent_hash: B256::repeat_byte(0x02),
                deposit_id: U256::from(1u64),
            },
            tx_hash: B256::repeat_byte(0xbb),
            block_number: 1,
        })
    }

    fn unrecognized() -> Notification {
        Notification::Unrecognized(UnrecognizedLog {
            inferred_id: Some(U256::from(9u64)),
            signature: Some(B256::repeat_byte(0xde)),
            reason: "unknown event signature".to_string(),
            tx_hash: B256::repeat_byte(0xdd),
            block_number: 2,
        })
    }

    #[tokio::test]
    async fn test_failing_consumer_does_not_block_others() {
        let failing = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(Recorder::default());

        let (tx, rx) = notification_channel();
        let relay = NotificationRelay::new(rx, vec![failing.clone(), healthy.clone()]);
        let task = tokio::spawn(relay.run());

        tx.send(cancelled()).await.unwrap();
        tx.send(unrecognized()).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(*failing.seen.lock().unwrap(), vec!["cancelled", "unrecognized"]);
        assert_eq!(*healthy.seen.lock().unwrap(), vec!["cancelled", "unrecognized"]);
    }

    /// Consumer whose deliveries never finish.
    struct Stuck;

    #[async_trait]
    impl NotificationConsumer for Stuck {
        fn name(&self) -> &'static str {
            "stuck"
        }

        async fn on_completed(&self, _: &CompletedIntent) -> Result<(), ConsumerError> {
            std::future::pending().await
        }

        async fn on_cancelled(&self, _: &CancelledIntent) -> Result<(), ConsumerError> {
            std::future::pending().await
        }

        async fn on_unrecognized(&self, _: &UnrecognizedLog) -> Result<(), ConsumerError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_consumer_does_not_back_pressure() {
        let healthy = Arc::new(Recorder::default());
        let (tx, rx) = notification_channel();
        let relay = NotificationRelay::new(rx, vec![Arc::new(Stuck), healthy.clone()]);
        let _task = tokio::spawn(relay.run());

        // Three times the queue size, so the stuck consumer's queue overflows.
        let total = DEFAULT_CHANNEL_BUFFER * 3;
        let send_all = async {
            for sent in 1..=total {
                tx.send(cancelled()).await.unwrap();
                if sent % 64 == 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(60), send_all)
            .await
            .expect("relay input must keep flowing");

        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        assert_eq!(healthy.seen.lock().unwrap().len(), total);
    }
}
