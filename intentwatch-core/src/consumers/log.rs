//! Consumer writing outcomes to the tracing log.

use super::{ConsumerError, NotificationConsumer};
use crate::contract::catalog::{conversion_rate, fiat_code, platform_name, usdc_amount};
use crate::contract::events::DecodedLog;
use crate::events::{CancelledIntent, CompletedIntent, UnrecognizedLog};
use async_trait::async_trait;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConsumer;

#[async_trait]
impl NotificationConsumer for LogConsumer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn on_completed(&self, completed: &CompletedIntent) -> Result<(), ConsumerError> {
        let intent = &completed.intent;
        let amount = usdc_amount(intent.amount).map(|a| a.round_dp(2));
        let quote = completed.quote.as_ref();

        info!(
            intent_hash = %intent.intent_hash,
            deposit_id = %intent.deposit_id,
            platform = platform_name(&intent.verifier).unwrap_or("unknown"),
            amount_usdc = ?amount,
            fiat = quote.and_then(|q| fiat_code(&q.fiat_currency)).unwrap_or("unknown"),
            rate = ?quote.and_then(|q| conversion_rate(q.conversion_rate)),
            owner = %intent.owner,
            to = %intent.to,
            tx_hash = %completed.tx_hash,
            block = completed.block_number,
            "Intent fulfilled"
        );
        Ok(())
    }

    async fn on_cancelled(&self, cancelled: &CancelledIntent) -> Result<(), ConsumerError> {
        info!(
            intent_hash = %cancelled.intent.intent_hash,
            deposit_id = %cancelled.intent.deposit_id,
            tx_hash = %cancelled.tx_hash,
            block = cancelled.block_number,
            "Intent cancelled"
        );
        Ok(())
    }

    async fn on_unrecognized(&self, unrecognized: &UnrecognizedLog) -> Result<(), ConsumerError> {
        warn!(
            inferred_id = ?unrecognized.inferred_id,
            signature = ?unrecognized.signature,
            reason = %unrecognized.reason,
            tx_hash = %unrecognized.tx_hash,
            block = unrecognized.block_number,
            "Unrecognized contract event"
        );
        Ok(())
    }

    async fn on_event(&self, event: &DecodedLog) -> Result<(), ConsumerError> {
        debug!(
            event = event.event.name(),
            deposit_id = ?event.event.deposit_id(),
            tx_hash = %event.tx_hash,
            block = event.block_number,
            "Contract event"
        );
        Ok(())
    }
}
