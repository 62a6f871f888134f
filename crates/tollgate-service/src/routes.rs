//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, analytics, dashboard, health, route, track, waitlist, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for the ingestion endpoint.
const TRACK_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for the rest of the public API.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `POST /api/waitlist` - Join the waitlist
/// - `GET /api/waitlist/count` - Waitlist size
///
/// ## Public API (session or bearer API key, rate-limited)
/// - `POST /api/v1/track` - Record a usage event
/// - `POST /api/v1/route` - Pick a provider for a prompt
/// - `GET /api/v1/analytics` - Aggregated usage
/// - `POST /api/v1/webhooks` - Register a webhook
/// - `GET /api/v1/webhooks` - List webhooks
/// - `GET /api/v1/webhooks/:id/deliveries` - Delivery log
///
/// ## Dashboard (session)
/// - `GET /api/dashboard/usage`
/// - `GET /api/dashboard/billing`
/// - `GET|POST /api/dashboard/subscription`
/// - `POST /api/dashboard/seed-data`
/// - `GET|POST /api/dashboard/team`
/// - `POST /api/dashboard/api-key`
///
/// ## Admin (`x-admin-key`)
/// - `GET /api/admin/waitlist`
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let track_routes = Router::new()
        .route("/", post(track::track))
        .layer(ConcurrencyLimitLayer::new(TRACK_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/route", post(route::route_request))
        .route("/analytics", get(analytics::analytics))
        .route(
            "/webhooks",
            post(webhooks::create_webhook).get(webhooks::list_webhooks),
        )
        .route("/webhooks/:id/deliveries", get(webhooks::list_deliveries))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .nest("/track", track_routes);

    let dashboard_routes = Router::new()
        .route("/usage", get(dashboard::usage))
        .route("/billing", get(dashboard::billing))
        .route(
            "/subscription",
            get(dashboard::get_subscription).post(dashboard::change_subscription),
        )
        .route("/seed-data", post(dashboard::seed_data))
        .route(
            "/team",
            get(dashboard::list_team).post(dashboard::invite_member),
        )
        .route("/api-key", post(dashboard::rotate_api_key));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/waitlist", post(waitlist::join))
        .route("/api/waitlist/count", get(waitlist::count))
        .nest("/api/v1", api_routes)
        .nest("/api/dashboard", dashboard_routes)
        .route("/api/admin/waitlist", get(admin::list_waitlist))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
