//! Error types for tollgate core logic.

use crate::ids::IdError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Validation errors raised while building domain values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// Email address does not look like `local@domain.tld`.
    #[error("invalid email address")]
    InvalidEmail,

    /// Provider name is not one of the supported providers.
    #[error("unsupported provider: {0}")]
    UnknownProvider(String),

    /// Plan name is not one of the known plans.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    /// Billing transaction kind is not one of the known kinds.
    #[error("unknown transaction kind: {0}")]
    UnknownTransactionKind(String),

    /// Team role is not one of the known roles.
    #[error("unknown team role: {0}")]
    UnknownRole(String),

    /// Cost must be a finite, non-negative number.
    #[error("cost must be a non-negative number, got {0}")]
    InvalidCost(f64),

    /// Token counts do not fit the storable range.
    #[error("token counts must not exceed {} in total", crate::usage::MAX_TOKEN_COUNT)]
    TokenOverflow,

    /// Webhook target URL is not an absolute http(s) URL.
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),

    /// Webhook must subscribe to at least one event type.
    #[error("webhook must subscribe to at least one event type")]
    NoEvents,

    /// Routing request had no prompt text.
    #[error("prompt is required")]
    MissingPrompt,

    /// Routing was attempted against an empty provider catalog.
    #[error("no providers configured")]
    EmptyCatalog,

    /// Analytics grouping is not one of `day`, `week`, `month`.
    #[error("unsupported groupBy value: {0}")]
    UnknownGranularity(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
