//! Provider routing handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use tollgate_core::routing::PREFERENCE_HISTORY_LIMIT;
use tollgate_core::{route, Provider, RouteRequest, RoutingDecision, UsageRecord};

use crate::auth::ApiCaller;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// Pick a provider and model for a prompt.
///
/// The decision is also stored as a usage record so later preference
/// scoring sees it. A failed audit write is logged and the decision is
/// still returned.
pub async fn route_request(
    State(state): State<Arc<AppState>>,
    caller: ApiCaller,
    ApiJson(body): ApiJson<RouteRequest>,
) -> Result<Json<RoutingDecision>, ApiError> {
    let history: Vec<Provider> = match state
        .store
        .recent_usage(&caller.user_id, PREFERENCE_HISTORY_LIMIT)
        .await
    {
        Ok(records) => records.iter().map(|r| r.provider).collect(),
        Err(e) => {
            tracing::warn!(error = %e, user_id = %caller.user_id, "Usage history unavailable, routing without preference");
            Vec::new()
        }
    };

    let decision = route(&body, &history)?;

    tracing::debug!(
        request_id = %decision.request_id,
        provider = decision.provider,
        model = %decision.model,
        estimated_tokens = decision.estimated_tokens,
        "Routed request"
    );

    let audit = UsageRecord::new(
        caller.user_id,
        decision.usage_provider,
        Some(decision.model.clone()),
        decision.estimated_tokens,
        0,
        decision.estimated_cost,
        decision.audit_metadata(&body),
    );

    match audit {
        Ok(record) => {
            if let Err(e) = state.store.insert_usage(&record).await {
                tracing::warn!(error = %e, request_id = %decision.request_id, "Failed to record routing decision");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, request_id = %decision.request_id, "Invalid routing audit record");
        }
    }

    Ok(Json(decision))
}
