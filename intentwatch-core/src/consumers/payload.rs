//! Conversion of notifications into webhook payloads.

use crate::contract::catalog::{self, fiat_code, platform_name};
use crate::events::{IntentQuote, Notification};
use alloy_primitives::U256;
use intentwatch_sdk::objects::{IntentQuotePayload, NotificationPayload};

fn usdc(raw: U256) -> String {
    catalog::usdc_amount(raw)
        .map(|amount| amount.to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn rate(raw: U256) -> String {
    catalog::conversion_rate(raw)
        .map(|rate| rate.to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn quote_payload(quote: &IntentQuote) -> IntentQuotePayload {
    IntentQuotePayload {
        fiat_currency: quote.fiat_currency.to_string(),
        fiat_code: fiat_code(&quote.fiat_currency).map(str::to_owned),
        conversion_rate: rate(quote.conversion_rate),
    }
}

/// Build the webhook payload of a notification, stamped with `timestamp`
/// (unix seconds).
pub fn to_payload(notification: &Notification, timestamp: i64) -> NotificationPayload {
    match notification {
        Notification::Completed(completed) => {
            let intent = &completed.intent;
            NotificationPayload::IntentCompleted {
                intent_hash: intent.intent_hash.to_string(),
                deposit_id: intent.deposit_id.to_string(),
                verifier: intent.verifier.to_string(),
                platform: platform_name(&intent.verifier).map(str::to_owned),
                owner: intent.owner.to_string(),
                to: intent.to.to_string(),
                amount: usdc(intent.amount),
                sustainability_fee: usdc(intent.sustainability_fee),
                verifier_fee: usdc(intent.verifier_fee),
                quote: completed.quote.as_ref().map(quote_payload),
                tx_hash: completed.tx_hash.to_string(),
                block_number: completed.block_number,
                timestamp,
            }
        }
        Notification::Cancelled(cancelled) => NotificationPayload::IntentCancelled {
            intent_hash: cancelled.intent.intent_hash.to_string(),
            deposit_id: cancelled.intent.deposit_id.to_string(),
            tx_hash: cancelled.tx_hash.to_string(),
            block_number: cancelled.block_number,
            timestamp,
        },
        Notification::Unrecognized(unrecognized) => NotificationPayload::UnrecognizedEvent {
            inferred_id: unrecognized.inferred_id.map(|id| id.to_string()),
            signature: unrecognized.signature.map(|s| s.to_string()),
            reason: unrecognized.reason.clone(),
            tx_hash: unrecognized.tx_hash.to_string(),
            block_number: unrecognized.block_number,
            timestamp,
        },
        Notification::Event(log) => NotificationPayload::ContractEvent {
            name: log.event.name().to_string(),
            deposit_id: log.event.deposit_id().map(|id| id.to_string()),
            tx_hash: log.tx_hash.to_string(),
            block_number: log.block_number,
            timestamp,
        },
    }
}
