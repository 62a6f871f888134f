//! Admin handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use tollgate_core::WaitlistEntry;

use crate::auth::AdminAuth;
use crate::error::{ApiError, ApiQuery};
use crate::state::AppState;

/// Default waitlist page size.
const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest waitlist page.
const MAX_PAGE_SIZE: usize = 500;

/// Paging parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Page size.
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: Option<usize>,
}

/// Waitlist page.
#[derive(Debug, Serialize)]
pub struct WaitlistPage {
    /// Total signups.
    pub total: u64,
    /// Effective page size.
    pub limit: usize,
    /// Effective offset.
    pub offset: usize,
    /// Signups, newest first.
    pub entries: Vec<WaitlistEntry>,
}

/// List waitlist signups.
pub async fn list_waitlist(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<WaitlistPage>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let total = state.store.waitlist_count().await?;
    let entries = state.store.list_waitlist(limit, offset).await?;

    tracing::debug!(admin_id = %admin.admin_id, total, returned = entries.len(), "Waitlist listed");

    Ok(Json(WaitlistPage {
        total,
        limit,
        offset,
        entries,
    }))
}
