//! Webhook subscriptions, event envelopes and delivery logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::signing::random_token;
use crate::{DeliveryId, UserId, WebhookId};

/// Event fired after a usage record is persisted.
pub const EVENT_USAGE_TRACKED: &str = "usage.tracked";

/// Maximum number of response-body bytes kept in a delivery log.
pub const MAX_LOGGED_BODY_BYTES: usize = 4096;

/// A user-registered webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Subscription identifier.
    pub id: WebhookId,

    /// Owner of the subscription.
    pub user_id: UserId,

    /// Absolute http(s) URL that receives deliveries.
    pub url: String,

    /// Event types this subscription wants.
    pub events: Vec<String>,

    /// Optional HMAC signing secret.
    pub secret: Option<String>,

    /// Inactive subscriptions are skipped by the dispatcher.
    pub active: bool,

    /// When the subscription was registered.
    pub created_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// Validate inputs and build a new active subscription.
    ///
    /// An empty or missing event list subscribes to `usage.tracked`.
    /// Event types are trimmed and de-duplicated, preserving order.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidUrl` unless `url` is an absolute http(s) URL.
    /// - `CoreError::NoEvents` if every supplied event type is blank.
    pub fn new(
        user_id: UserId,
        url: &str,
        events: Option<Vec<String>>,
        secret: Option<String>,
    ) -> Result<Self, CoreError> {
        let url = url.trim();
        if !is_absolute_http_url(url) {
            return Err(CoreError::InvalidUrl(url.to_string()));
        }

        let events = match events {
            None => vec![EVENT_USAGE_TRACKED.to_string()],
            Some(list) if list.is_empty() => vec![EVENT_USAGE_TRACKED.to_string()],
            Some(list) => {
                let mut unique: Vec<String> = Vec::with_capacity(list.len());
                for event in list {
                    let event = event.trim().to_string();
                    if !event.is_empty() && !unique.contains(&event) {
                        unique.push(event);
                    }
                }
                if unique.is_empty() {
                    return Err(CoreError::NoEvents);
                }
                unique
            }
        };

        let secret = secret.filter(|s| !s.is_empty());

        Ok(Self {
            id: WebhookId::generate(),
            user_id,
            url: url.to_string(),
            events,
            secret,
            active: true,
            created_at: Utc::now(),
        })
    }

    /// Whether this subscription should receive `event_type`.
    #[must_use]
    pub fn wants(&self, event_type: &str) -> bool {
        self.active && self.events.iter().any(|e| e == event_type)
    }
}

fn is_absolute_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
}

/// The JSON body POSTed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// `evt_<unix millis>_<random>`.
    pub id: String,

    /// Event type, e.g. `usage.tracked`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event payload.
    pub data: serde_json::Value,

    /// Envelope creation time.
    pub created: DateTime<Utc>,
}

impl EventEnvelope {
    /// Wrap a payload in a fresh envelope.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        let created = Utc::now();
        Self {
            id: format!(
                "evt_{}_{}",
                created.timestamp_millis(),
                random_token(8).to_lowercase()
            ),
            event_type: event_type.into(),
            data,
            created,
        }
    }
}

/// Audit row for one delivery attempt to one subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDeliveryLog {
    /// Delivery identifier.
    pub id: DeliveryId,

    /// The subscription that was called.
    pub webhook_id: WebhookId,

    /// Event type that was delivered.
    pub event_type: String,

    /// The full envelope that was sent.
    pub payload: serde_json::Value,

    /// HTTP status, or 0 if the request never got a response.
    pub response_status: u16,

    /// Response body, best effort and truncated.
    pub response_body: String,

    /// Whether the subscriber answered with a 2xx status.
    pub success: bool,

    /// When the attempt finished.
    pub delivered_at: DateTime<Utc>,
}

impl WebhookDeliveryLog {
    /// Record the outcome of an attempt. `status == 0` means a network failure.
    #[must_use]
    pub fn new(
        webhook_id: WebhookId,
        envelope: &EventEnvelope,
        response_status: u16,
        response_body: &str,
    ) -> Self {
        Self {
            id: DeliveryId::generate(),
            webhook_id,
            event_type: envelope.event_type.clone(),
            payload: serde_json::to_value(envelope).unwrap_or(serde_json::Value::Null),
            response_status,
            response_body: truncate_utf8(response_body, MAX_LOGGED_BODY_BYTES).to_string(),
            success: (200..300).contains(&response_status),
            delivered_at: Utc::now(),
        }
    }
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
