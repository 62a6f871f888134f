//! Core types and pure logic for tollgate.
//!
//! This crate provides the foundational types used throughout the tollgate service:
//!
//! - **Identifiers**: `UserId`, `UsageRecordId`, `WebhookId`, `DeliveryId`, ...
//! - **Usage**: `UsageRecord`, `Provider`, `Metadata` sanitization
//! - **Webhooks**: `WebhookSubscription`, `WebhookDeliveryLog`, `EventEnvelope`
//! - **Waitlist**: `WaitlistEntry`, email normalization
//! - **Routing**: the static provider catalog and the scoring heuristic
//! - **Analytics**: aggregation of usage records into totals and time series
//! - **Accounts**: `User`, `Plan`, `BillingTransaction`, `TeamMember`
//!
//! Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod analytics;
pub mod error;
pub mod ids;
pub mod routing;
pub mod signing;
pub mod usage;
pub mod waitlist;
pub mod webhook;

pub use account::{
    generate_api_key, BillingTransaction, Plan, TeamMember, TeamRole, TransactionKind, User,
};
pub use analytics::{
    aggregate, AnalyticsReport, Breakdown, Granularity, TimeBucket, UsageTotals,
};
pub use error::{CoreError, Result};
pub use ids::{
    BillingTransactionId, DeliveryId, IdError, TeamMemberId, UsageRecordId, UserId, WebhookId,
};
pub use routing::{
    estimate_tokens, route, ProviderProfile, ProviderScore, RouteRequest, RoutingDecision,
    PROVIDER_CATALOG,
};
pub use signing::{constant_time_eq, hmac_sha256_hex, random_token};
pub use usage::{
    sanitize_metadata, Metadata, Provider, UsageRecord, MAX_TOKEN_COUNT, METADATA_ALLOW_LIST,
};
pub use waitlist::{normalize_email, WaitlistEntry};
pub use webhook::{
    EventEnvelope, WebhookDeliveryLog, WebhookSubscription, EVENT_USAGE_TRACKED,
};
