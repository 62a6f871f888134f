//! Tollgate HTTP API service.
//!
//! This crate provides the HTTP API for tollgate, including:
//!
//! - Waitlist signup and admin listing
//! - Usage ingestion with webhook fan-out
//! - Provider routing and usage analytics
//! - Customer dashboard endpoints
//!
//! # Authentication
//!
//! 1. **Session cookie** - HS256 JWT, used by the dashboard
//! 2. **API keys** - `Authorization: Bearer <key>` on `/api/v1`, checked
//!    after the session

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers must be async for the router

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use dispatcher::{DispatchSummary, WebhookDispatcher};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
