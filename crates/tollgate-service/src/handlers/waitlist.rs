//! Waitlist signup handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use tollgate_core::WaitlistEntry;
use tollgate_store::StoreError;

use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// Signup request.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// Email address to register.
    pub email: Option<String>,
}

/// Signup response.
#[derive(Debug, Serialize)]
pub struct JoinResponse {
    /// Always true on success.
    pub success: bool,
}

/// Waitlist size.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    /// Number of signups.
    pub count: u64,
}

/// Join the waitlist.
pub async fn join(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let email = body
        .email
        .ok_or_else(|| ApiError::BadRequest("email is required".into()))?;
    let entry = WaitlistEntry::new(&email)?;

    match state.store.add_waitlist(&entry).await {
        Ok(()) => {
            tracing::info!(email = %entry.email, "Waitlist signup");
            Ok(Json(JoinResponse { success: true }))
        }
        Err(StoreError::Duplicate { .. }) => Err(ApiError::Conflict("already on waitlist".into())),
        Err(e) => Err(e.into()),
    }
}

/// Number of waitlist signups.
pub async fn count(State(state): State<Arc<AppState>>) -> Result<Json<CountResponse>, ApiError> {
    let count = state.store.waitlist_count().await?;
    Ok(Json(CountResponse { count }))
}
