//! Customer dashboard handlers.
//!
//! Session-authenticated aggregate reads and account writes. Reads that
//! feed purely informational panels degrade to defaults when the store
//! fails, so a partially provisioned database still renders a dashboard.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use tollgate_core::routing::PROVIDER_CATALOG;
use tollgate_core::{
    generate_api_key, BillingTransaction, Metadata, Plan, TeamMember, TeamRole, UsageRecord,
    UsageTotals, User,
};
use tollgate_store::StoreError;

use crate::auth::SessionUser;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

/// Records shown in the "recent activity" panel.
const RECENT_USAGE_LIMIT: usize = 20;

/// Billing transactions shown on the billing page.
const BILLING_HISTORY_LIMIT: usize = 50;

/// Days of demo data generated by `seed_data`.
const SEED_DAYS: i64 = 30;

/// Upper bound of demo records per day.
const SEED_MAX_PER_DAY: u32 = 4;

/// Load the session user's row, creating a free-plan row on first use.
async fn ensure_user(state: &AppState, session: &SessionUser) -> Result<User, ApiError> {
    if let Some(user) = state.store.get_user(&session.user_id).await? {
        return Ok(user);
    }

    let user = User::new(session.user_id, session.email.clone());
    state.store.put_user(&user).await?;
    tracing::info!(user_id = %user.id, "Created user on first dashboard visit");
    Ok(user)
}

/// Current plan, or `free` when unknown or unreadable.
async fn current_plan(state: &AppState, session: &SessionUser) -> Plan {
    match state.store.get_user(&session.user_id).await {
        Ok(user) => user.map(|u| u.plan).unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, user_id = %session.user_id, "Plan lookup failed, assuming free");
            Plan::Free
        }
    }
}

/// First instant of the current UTC month.
fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

// ============================================================================
// Usage
// ============================================================================

/// Usage overview response.
#[derive(Debug, Serialize)]
pub struct UsageOverview {
    /// Current plan.
    pub plan: Plan,
    /// Start of the current billing month.
    pub period_start: DateTime<Utc>,
    /// Month-to-date totals.
    pub totals: UsageTotals,
    /// Included tokens per month; `null` when unlimited.
    pub token_allowance: Option<u64>,
    /// Share of the allowance used, in percent.
    pub percent_used: Option<f64>,
    /// Most recent records.
    pub recent: Vec<UsageRecord>,
}

/// Month-to-date usage against the plan allowance.
#[allow(clippy::cast_precision_loss)]
pub async fn usage(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<UsageOverview>, ApiError> {
    let now = Utc::now();
    let period_start = month_start(now);
    let plan = current_plan(&state, &session).await;

    let month = state
        .store
        .usage_between(&session.user_id, period_start, now, None)
        .await?;
    let totals = UsageTotals::of(&month);
    let recent = state
        .store
        .recent_usage(&session.user_id, RECENT_USAGE_LIMIT)
        .await?;

    let token_allowance = plan.monthly_token_allowance();
    let percent_used = token_allowance
        .filter(|allowance| *allowance > 0)
        .map(|allowance| totals.total_tokens as f64 / allowance as f64 * 100.0);

    Ok(Json(UsageOverview {
        plan,
        period_start,
        totals,
        token_allowance,
        percent_used,
        recent,
    }))
}

// ============================================================================
// Billing
// ============================================================================

/// Billing overview response.
#[derive(Debug, Serialize)]
pub struct BillingOverview {
    /// Current plan.
    pub plan: Plan,
    /// Plan fee in cents.
    pub monthly_price_cents: i64,
    /// Month-to-date metered usage cost in USD.
    pub month_to_date_cost: f64,
    /// Billing history, newest first.
    pub transactions: Vec<BillingTransaction>,
}

/// Plan, fees and billing history. Never fails on store errors.
pub async fn billing(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Json<BillingOverview> {
    let now = Utc::now();
    let plan = current_plan(&state, &session).await;

    let month_to_date_cost = match state
        .store
        .usage_between(&session.user_id, month_start(now), now, None)
        .await
    {
        Ok(records) => UsageTotals::of(&records).cost,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %session.user_id, "Usage unavailable for billing");
            0.0
        }
    };

    let transactions = state
        .store
        .list_billing_transactions(&session.user_id, BILLING_HISTORY_LIMIT)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, user_id = %session.user_id, "Billing history unavailable");
            Vec::new()
        });

    Json(BillingOverview {
        plan,
        monthly_price_cents: plan.monthly_price_cents(),
        month_to_date_cost,
        transactions,
    })
}

// ============================================================================
// Subscription
// ============================================================================

/// Subscription state.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// Current plan.
    pub plan: Plan,
    /// Plan fee in cents.
    pub monthly_price_cents: i64,
    /// Included tokens per month; `null` when unlimited.
    pub token_allowance: Option<u64>,
    /// Whether this request changed the plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

impl SubscriptionResponse {
    fn new(plan: Plan, changed: Option<bool>) -> Self {
        Self {
            plan,
            monthly_price_cents: plan.monthly_price_cents(),
            token_allowance: plan.monthly_token_allowance(),
            changed,
        }
    }
}

/// Plan change request.
#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    /// Target plan name.
    pub plan: String,
}

/// Current subscription.
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Json<SubscriptionResponse> {
    let plan = current_plan(&state, &session).await;
    Json(SubscriptionResponse::new(plan, None))
}

/// Switch plans, recording a subscription charge when the plan changes.
pub async fn change_subscription(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    ApiJson(body): ApiJson<ChangePlanRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let plan: Plan = body.plan.parse()?;
    let user = ensure_user(&state, &session).await?;

    if user.plan == plan {
        return Ok(Json(SubscriptionResponse::new(plan, Some(false))));
    }

    state.store.set_plan(&user.id, plan).await?;
    state
        .store
        .insert_billing_transaction(&BillingTransaction::subscription(user.id, plan))
        .await?;

    tracing::info!(user_id = %user.id, from = %user.plan, to = %plan, "Plan changed");

    Ok(Json(SubscriptionResponse::new(plan, Some(true))))
}

// ============================================================================
// Demo data
// ============================================================================

/// Seed response.
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    /// Always true on success.
    pub success: bool,
    /// Number of records inserted.
    pub inserted: usize,
}

/// Build `SEED_DAYS` days of plausible usage across the catalog.
fn demo_records(user: &SessionUser, now: DateTime<Utc>) -> Vec<UsageRecord> {
    let mut rng = rand::thread_rng();
    let mut records = Vec::new();

    for day in 0..SEED_DAYS {
        for _ in 0..rng.gen_range(1..=SEED_MAX_PER_DAY) {
            let Some(profile) = PROVIDER_CATALOG.choose(&mut rng) else {
                continue;
            };
            let model = profile
                .models
                .choose(&mut rng)
                .copied()
                .unwrap_or_else(|| profile.default_model());
            let input = rng.gen_range(100..4000);
            let output = rng.gen_range(50..2000);

            let mut metadata = Metadata::new();
            metadata.insert("environment".into(), "demo".into());
            metadata.insert("feature_name".into(), "seed".into());

            let at = now - Duration::days(day) - Duration::minutes(rng.gen_range(0..24 * 60));
            if let Ok(record) = UsageRecord::new(
                user.user_id,
                profile.provider,
                Some(model.to_string()),
                input,
                output,
                profile.cost_for(input, output),
                metadata,
            ) {
                records.push(record.at(at));
            }
        }
    }

    records
}

/// Insert demo usage for the session user.
pub async fn seed_data(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<SeedResponse>, ApiError> {
    ensure_user(&state, &session).await?;

    let records = demo_records(&session, Utc::now());
    state.store.insert_usage_batch(&records).await?;

    tracing::info!(user_id = %session.user_id, inserted = records.len(), "Seeded demo usage");

    Ok(Json(SeedResponse {
        success: true,
        inserted: records.len(),
    }))
}

// ============================================================================
// Team
// ============================================================================

/// Team listing.
#[derive(Debug, Serialize)]
pub struct TeamResponse {
    /// Members, oldest invitation first.
    pub members: Vec<TeamMember>,
}

/// Invitation request.
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    /// Invitee email.
    pub email: String,
    /// Role, `member` when omitted.
    pub role: Option<String>,
}

/// List the session user's team.
pub async fn list_team(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<TeamResponse>, ApiError> {
    let members = state.store.list_team(&session.user_id).await?;
    Ok(Json(TeamResponse { members }))
}

/// Invite someone to the session user's team.
pub async fn invite_member(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
    ApiJson(body): ApiJson<InviteRequest>,
) -> Result<(StatusCode, Json<TeamMember>), ApiError> {
    let role: TeamRole = body
        .role
        .as_deref()
        .map(str::parse::<TeamRole>)
        .transpose()?
        .unwrap_or_default();
    let member = TeamMember::invite(session.user_id, &body.email, role)?;

    match state.store.add_team_member(&member).await {
        Ok(()) => {
            tracing::info!(owner_id = %session.user_id, role = role.as_str(), "Team member invited");
            Ok((StatusCode::CREATED, Json(member)))
        }
        Err(StoreError::Duplicate { .. }) => {
            Err(ApiError::Conflict("already a team member".into()))
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// API key
// ============================================================================

/// Freshly issued API key. Only returned once.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    /// The key.
    pub api_key: String,
}

/// Create or rotate the session user's API key.
pub async fn rotate_api_key(
    State(state): State<Arc<AppState>>,
    session: SessionUser,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let user = ensure_user(&state, &session).await?;
    let api_key = generate_api_key();
    state.store.set_api_key(&user.id, &api_key).await?;

    tracing::info!(user_id = %user.id, rotated = user.api_key.is_some(), "API key issued");

    Ok(Json(ApiKeyResponse { api_key }))
}
