//! Outgoing webhook delivery.
//!
//! Deliveries are single best-effort attempts. Every attempt writes exactly
//! one row to the delivery log, and no failure is ever returned to the code
//! that triggered the event.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;

use tollgate_core::{hmac_sha256_hex, EventEnvelope, UserId, WebhookDeliveryLog, WebhookSubscription};
use tollgate_store::Store;

/// Signature header, `sha256=<hex>` over the raw request body.
pub const SIGNATURE_HEADER: &str = "x-tollgate-signature";

/// Event type header.
pub const EVENT_HEADER: &str = "x-tollgate-event";

/// Envelope id header.
pub const DELIVERY_HEADER: &str = "x-tollgate-delivery";

/// Outcome of one `notify` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Subscriptions a delivery was attempted for.
    pub attempted: usize,
    /// Deliveries answered with a 2xx status.
    pub succeeded: usize,
}

/// Fans events out to the owning user's subscriptions.
#[derive(Clone)]
pub struct WebhookDispatcher {
    store: Arc<dyn Store>,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    /// Create a dispatcher whose requests time out after `timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    timeout = ?timeout,
                    "Failed to build webhook HTTP client, deliveries will use reqwest defaults"
                );
                reqwest::Client::new()
            }
        };

        Self { store, client }
    }

    /// Deliver `data` as `event_type` to every active subscription of
    /// `user_id` that wants it, concurrently, and wait for all attempts.
    pub async fn notify(
        &self,
        event_type: &str,
        user_id: UserId,
        data: serde_json::Value,
    ) -> DispatchSummary {
        let subscriptions = match self
            .store
            .active_webhooks_for_event(&user_id, event_type)
            .await
        {
            Ok(subs) => subs,
            Err(e) => {
                tracing::error!(error = %e, user_id = %user_id, event_type, "Failed to load webhooks");
                return DispatchSummary::default();
            }
        };

        if subscriptions.is_empty() {
            return DispatchSummary::default();
        }

        let envelope = EventEnvelope::new(event_type, data);
        let outcomes = join_all(
            subscriptions
                .iter()
                .map(|subscription| self.deliver_one(subscription, &envelope)),
        )
        .await;

        let summary = DispatchSummary {
            attempted: outcomes.len(),
            succeeded: outcomes.iter().filter(|ok| **ok).count(),
        };

        tracing::debug!(
            event_id = %envelope.id,
            event_type,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            "Webhook fan-out finished"
        );

        summary
    }

    /// Run [`notify`](Self::notify) on a detached task.
    ///
    /// The returned handle may be dropped; delivery continues regardless.
    pub fn spawn_notify(
        &self,
        event_type: &str,
        user_id: UserId,
        data: serde_json::Value,
    ) -> tokio::task::JoinHandle<DispatchSummary> {
        let dispatcher = self.clone();
        let event_type = event_type.to_string();
        tokio::spawn(async move { dispatcher.notify(&event_type, user_id, data).await })
    }

    /// POST `envelope` to one subscriber and log the attempt.
    ///
    /// Returns `true` iff the subscriber answered 2xx.
    pub async fn deliver_one(
        &self,
        subscription: &WebhookSubscription,
        envelope: &EventEnvelope,
    ) -> bool {
        let body = match serde_json::to_string(envelope) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize webhook envelope");
                return false;
            }
        };

        let mut request = self
            .client
            .post(&subscription.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, &envelope.event_type)
            .header(DELIVERY_HEADER, &envelope.id);

        if let Some(secret) = &subscription.secret {
            let signature = hmac_sha256_hex(secret, &body);
            request = request.header(SIGNATURE_HEADER, format!("sha256={signature}"));
        }

        let (status, response_body) = match request.body(body).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                (status, text)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    webhook_id = %subscription.id,
                    url = %subscription.url,
                    "Webhook delivery failed"
                );
                (0, String::new())
            }
        };

        let log = WebhookDeliveryLog::new(subscription.id, envelope, status, &response_body);
        let success = log.success;

        if let Err(e) = self.store.insert_delivery(&log).await {
            tracing::error!(error = %e, webhook_id = %subscription.id, "Failed to record webhook delivery");
        }

        success
    }
}
