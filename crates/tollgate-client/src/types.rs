//! Request and response types for the tollgate client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tollgate_core::{UsageRecordId, WebhookDeliveryLog, WebhookId};

// ============================================================================
// Tracking
// ============================================================================

/// Usage event to record.
#[derive(Debug, Clone, Serialize)]
pub struct TrackEvent {
    /// Provider name (`openai`, `anthropic`, `google`, `custom`).
    pub provider: String,
    /// Model name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Token counts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    /// Cost in USD. The server estimates it from catalog pricing when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Metadata. Only `request_id`, `session_id`, `feature_name`,
    /// `environment` and `version` are kept by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Token counts of one call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input: u64,
    /// Completion tokens.
    pub output: u64,
}

/// Response to a tracked event.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackResponse {
    /// Always true on success.
    pub success: bool,
    /// ID of the stored record.
    pub id: UsageRecordId,
    /// Server-assigned timestamp.
    pub tracked_at: DateTime<Utc>,
}

// ============================================================================
// Routing
// ============================================================================

/// Routing request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptions {
    /// Prompt text.
    pub prompt: String,
    /// Preferred model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Completion budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Metadata recorded with the routing audit record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RouteOptions {
    /// Route `prompt` with no other preferences.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// Score breakdown for one provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderScore {
    /// Provider routing key.
    pub provider: String,
    /// Cost component.
    pub cost_score: f64,
    /// Latency component.
    pub latency_score: f64,
    /// Reliability component.
    pub reliability_score: f64,
    /// Preference component.
    pub preference_score: f64,
    /// Weighted total.
    pub total: f64,
    /// Estimated prompt cost.
    pub estimated_cost: f64,
}

/// Routing decision.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDecision {
    /// Decision identifier.
    pub request_id: String,
    /// Chosen provider routing key.
    pub provider: String,
    /// Chosen provider display name.
    pub provider_name: String,
    /// Chosen model.
    pub model: String,
    /// Base API URL of the chosen provider.
    pub base_url: String,
    /// Human-readable justification.
    pub rationale: String,
    /// Estimated prompt tokens.
    pub estimated_tokens: u64,
    /// Estimated prompt cost.
    pub estimated_cost: f64,
    /// Average latency of the chosen provider.
    pub avg_latency_ms: u32,
    /// Reliability of the chosen provider.
    pub reliability: f64,
    /// Scores for every provider.
    pub scores: Vec<ProviderScore>,
}

// ============================================================================
// Analytics
// ============================================================================

/// Analytics filters. Dates are RFC 3339 timestamps or `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    /// Window start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Window end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Restrict to one provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// `day`, `week` or `month`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
}

/// Aggregated counters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageSummary {
    /// Number of records.
    pub requests: u64,
    /// Input tokens.
    pub input_tokens: u64,
    /// Output tokens.
    pub output_tokens: u64,
    /// Total tokens.
    pub total_tokens: u64,
    /// Cost in USD.
    pub cost: f64,
}

/// Counters for one provider or model.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSummary {
    /// Provider or model name.
    pub name: String,
    /// Counters.
    #[serde(flatten)]
    pub totals: UsageSummary,
}

/// One time-series point.
#[derive(Debug, Clone, Deserialize)]
pub struct PeriodSummary {
    /// Bucket label.
    pub period: String,
    /// Records in the bucket.
    pub requests: u64,
    /// Tokens in the bucket.
    pub total_tokens: u64,
    /// Cost in the bucket.
    pub cost: f64,
}

/// Analytics report.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsReport {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
    /// Bucket width.
    pub granularity: String,
    /// Totals.
    pub totals: UsageSummary,
    /// Per-provider totals.
    pub by_provider: Vec<GroupSummary>,
    /// Per-model totals.
    pub by_model: Vec<GroupSummary>,
    /// Time series, oldest first.
    pub time_series: Vec<PeriodSummary>,
}

// ============================================================================
// Webhooks
// ============================================================================

/// Webhook registration.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRegistration {
    /// Receiving URL.
    pub url: String,
    /// Event types; the server defaults to `usage.tracked`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
    /// HMAC signing secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// A registered webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct Webhook {
    /// Subscription ID.
    pub id: WebhookId,
    /// Receiving URL.
    pub url: String,
    /// Subscribed events.
    pub events: Vec<String>,
    /// Whether deliveries are active.
    pub active: bool,
    /// Whether payloads are signed.
    pub has_secret: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Webhook listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WebhookList {
    pub webhooks: Vec<Webhook>,
}

/// Delivery log of one webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryLog {
    /// The webhook.
    pub webhook_id: WebhookId,
    /// Attempts, newest first.
    pub deliveries: Vec<WebhookDeliveryLog>,
}

// ============================================================================
// Errors
// ============================================================================

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
}
