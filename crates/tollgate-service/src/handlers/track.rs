//! Usage ingestion handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tollgate_core::routing::profile_for_model;
use tollgate_core::{sanitize_metadata, Provider, UsageRecord, UsageRecordId, EVENT_USAGE_TRACKED};

use crate::auth::ApiCaller;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// Usage event reported by a client.
#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    /// Provider name (`openai`, `anthropic`, `google`, `custom`).
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Token counts.
    pub tokens: Option<TokenCounts>,
    /// Cost in USD. Estimated from catalog pricing when absent.
    pub cost: Option<f64>,
    /// Free-form metadata; only allow-listed keys are kept.
    pub metadata: Option<serde_json::Value>,
}

/// Token counts of one call.
#[derive(Debug, Default, Deserialize)]
pub struct TokenCounts {
    /// Prompt tokens.
    #[serde(default)]
    pub input: u64,
    /// Completion tokens.
    #[serde(default)]
    pub output: u64,
}

/// Ingestion response.
#[derive(Debug, Serialize)]
pub struct TrackResponse {
    /// Always true on success.
    pub success: bool,
    /// ID of the stored record.
    pub id: UsageRecordId,
    /// Server-assigned timestamp.
    pub tracked_at: DateTime<Utc>,
}

/// Record one usage event and notify subscribers.
pub async fn track(
    State(state): State<Arc<AppState>>,
    caller: ApiCaller,
    ApiJson(body): ApiJson<TrackRequest>,
) -> Result<Json<TrackResponse>, ApiError> {
    let provider: Provider = body
        .provider
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("provider is required".into()))?
        .parse()?;

    let tokens = body.tokens.unwrap_or_default();
    let cost = body.cost.unwrap_or_else(|| {
        body.model
            .as_deref()
            .and_then(profile_for_model)
            .map_or(0.0, |profile| profile.cost_for(tokens.input, tokens.output))
    });

    let record = UsageRecord::new(
        caller.user_id,
        provider,
        body.model,
        tokens.input,
        tokens.output,
        cost,
        sanitize_metadata(body.metadata.as_ref()),
    )?;

    state.store.insert_usage(&record).await?;

    tracing::debug!(
        record_id = %record.id,
        user_id = %record.user_id,
        provider = %record.provider,
        total_tokens = record.total_tokens,
        "Usage tracked"
    );

    match serde_json::to_value(&record) {
        Ok(data) => {
            state
                .dispatcher
                .spawn_notify(EVENT_USAGE_TRACKED, record.user_id, data);
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize usage event"),
    }

    Ok(Json(TrackResponse {
        success: true,
        id: record.id,
        tracked_at: record.created_at,
    }))
}
