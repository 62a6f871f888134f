//! Webhook registration handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tollgate_core::{WebhookDeliveryLog, WebhookId, WebhookSubscription};

use crate::auth::ApiCaller;
use crate::error::{ApiError, ApiJson, ApiQuery};
use crate::state::AppState;

/// Default page size for delivery logs.
const DEFAULT_DELIVERY_LIMIT: usize = 50;

/// Largest delivery log page.
const MAX_DELIVERY_LIMIT: usize = 200;

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    /// Target URL (absolute http or https).
    pub url: String,
    /// Event types; defaults to `usage.tracked`.
    pub events: Option<Vec<String>>,
    /// Optional HMAC signing secret.
    pub secret: Option<String>,
}

/// Subscription as returned by the API. The secret itself is never echoed.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Subscription ID.
    pub id: WebhookId,
    /// Target URL.
    pub url: String,
    /// Subscribed event types.
    pub events: Vec<String>,
    /// Whether deliveries are active.
    pub active: bool,
    /// Whether payloads are signed.
    pub has_secret: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl From<&WebhookSubscription> for WebhookResponse {
    fn from(sub: &WebhookSubscription) -> Self {
        Self {
            id: sub.id,
            url: sub.url.clone(),
            events: sub.events.clone(),
            active: sub.active,
            has_secret: sub.secret.is_some(),
            created_at: sub.created_at,
        }
    }
}

/// List response.
#[derive(Debug, Serialize)]
pub struct WebhookListResponse {
    /// The caller's subscriptions, newest first.
    pub webhooks: Vec<WebhookResponse>,
}

/// Delivery log query.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveriesQuery {
    /// Page size (default 50, max 200).
    pub limit: Option<usize>,
}

/// Delivery log response.
#[derive(Debug, Serialize)]
pub struct DeliveriesResponse {
    /// Subscription the log belongs to.
    pub webhook_id: WebhookId,
    /// Attempts, newest first.
    pub deliveries: Vec<WebhookDeliveryLog>,
}

/// Register a webhook.
pub async fn create_webhook(
    State(state): State<Arc<AppState>>,
    caller: ApiCaller,
    ApiJson(body): ApiJson<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<WebhookResponse>), ApiError> {
    let subscription =
        WebhookSubscription::new(caller.user_id, &body.url, body.events, body.secret)?;
    state.store.insert_webhook(&subscription).await?;

    tracing::info!(
        webhook_id = %subscription.id,
        user_id = %caller.user_id,
        events = ?subscription.events,
        "Webhook registered"
    );

    Ok((StatusCode::CREATED, Json(WebhookResponse::from(&subscription))))
}

/// List the caller's webhooks.
pub async fn list_webhooks(
    State(state): State<Arc<AppState>>,
    caller: ApiCaller,
) -> Result<Json<WebhookListResponse>, ApiError> {
    let webhooks = state.store.list_webhooks(&caller.user_id).await?;
    Ok(Json(WebhookListResponse {
        webhooks: webhooks.iter().map(WebhookResponse::from).collect(),
    }))
}

/// Delivery log of one of the caller's webhooks.
pub async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    caller: ApiCaller,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<DeliveriesQuery>,
) -> Result<Json<DeliveriesResponse>, ApiError> {
    let not_found = || ApiError::NotFound(format!("webhook not found: {id}"));

    let webhook_id: WebhookId = id.parse().map_err(|_| not_found())?;
    let webhook = state
        .store
        .get_webhook(&webhook_id)
        .await?
        .filter(|w| w.user_id == caller.user_id)
        .ok_or_else(not_found)?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_DELIVERY_LIMIT)
        .clamp(1, MAX_DELIVERY_LIMIT);
    let deliveries = state.store.list_deliveries(&webhook.id, limit).await?;

    Ok(Json(DeliveriesResponse {
        webhook_id: webhook.id,
        deliveries,
    }))
}
