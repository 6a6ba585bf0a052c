//! Consumer POSTing notifications to a webhook endpoint.
//!
//! One attempt per notification; failures are reported back to the relay,
//! which logs them.

use super::{ConsumerError, NotificationConsumer, to_payload};
use crate::contract::events::DecodedLog;
use crate::events::{CancelledIntent, CompletedIntent, Notification, UnrecognizedLog};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WebhookConsumer {
    url: Url,
    /// Also forward pass-through contract events.
    include_events: bool,
    http_client: reqwest::Client,
}

impl WebhookConsumer {
    pub fn new(url: Url, timeout: Duration, include_events: bool) -> Self {
        Self {
            url,
            include_events,
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn deliver(&self, notification: Notification) -> Result<(), ConsumerError> {
        let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
        let payload = to_payload(&notification, timestamp);
        let body = serde_json::to_string(&payload)?;

        let response = self
            .http_client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(
                url = %self.url,
                tx_hash = payload.tx_hash(),
                "Webhook delivered"
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ConsumerError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl NotificationConsumer for WebhookConsumer {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn on_completed(&self, completed: &CompletedIntent) -> Result<(), ConsumerError> {
        self.deliver(Notification::Completed(completed.clone())).await
    }

    async fn on_cancelled(&self, cancelled: &CancelledIntent) -> Result<(), ConsumerError> {
        self.deliver(Notification::Cancelled(cancelled.clone())).await
    }

    async fn on_unrecognized(&self, unrecognized: &UnrecognizedLog) -> Result<(), ConsumerError> {
        self.deliver(Notification::Unrecognized(unrecognized.clone()))
            .await
    }

    async fn on_event(&self, event: &DecodedLog) -> Result<(), ConsumerError> {
        if !self.include_events {
            debug!(event = event.event.name(), "Contract event not forwarded to webhook");
            return Ok(());
        }
        self.deliver(Notification::Event(event.clone())).await
    }
}
