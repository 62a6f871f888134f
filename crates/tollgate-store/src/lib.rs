//! Storage layer for tollgate.
//!
//! The service talks to persistence only through the [`Store`] trait, which
//! has two implementations:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, schema managed by the embedded
//!   migrations in `migrations/`.
//! - [`MemoryStore`]: `tokio::sync::RwLock`-guarded maps for tests and local
//!   runs without a database.
//!
//! Listing methods return rows newest first unless documented otherwise.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tollgate_core::{
    BillingTransaction, Plan, Provider, TeamMember, UsageRecord, User, UserId, WaitlistEntry,
    WebhookDeliveryLog, WebhookId, WebhookSubscription,
};

/// The storage trait defining all database operations.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user, or update email/plan/api key if the id already exists.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the API key belongs to another user.
    async fn put_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Resolve an API key to its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>>;

    /// Replace a user's API key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn set_api_key(&self, user_id: &UserId, api_key: &str) -> Result<()>;

    /// Change a user's plan.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn set_plan(&self, user_id: &UserId, plan: Plan) -> Result<()>;

    // =========================================================================
    // Usage
    // =========================================================================

    /// Persist one usage record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_usage(&self, record: &UsageRecord) -> Result<()>;

    /// Persist many usage records in one go.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is written
    /// in that case.
    async fn insert_usage_batch(&self, records: &[UsageRecord]) -> Result<()>;

    /// The user's most recent usage records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn recent_usage(&self, user_id: &UserId, limit: usize) -> Result<Vec<UsageRecord>>;

    /// The user's usage records with `start <= created_at <= end`, oldest
    /// first, optionally restricted to one provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn usage_between(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        provider: Option<Provider>,
    ) -> Result<Vec<UsageRecord>>;

    // =========================================================================
    // Waitlist
    // =========================================================================

    /// Add a signup.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the email is already present.
    async fn add_waitlist(&self, entry: &WaitlistEntry) -> Result<()>;

    /// Number of signups.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn waitlist_count(&self) -> Result<u64>;

    /// Page of signups, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_waitlist(&self, limit: usize, offset: usize) -> Result<Vec<WaitlistEntry>>;

    // =========================================================================
    // Webhooks
    // =========================================================================

    /// Register a webhook subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_webhook(&self, webhook: &WebhookSubscription) -> Result<()>;

    /// Get a subscription by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_webhook(&self, webhook_id: &WebhookId) -> Result<Option<WebhookSubscription>>;

    /// All of a user's subscriptions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_webhooks(&self, user_id: &UserId) -> Result<Vec<WebhookSubscription>>;

    /// The user's active subscriptions whose event set contains `event_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn active_webhooks_for_event(
        &self,
        user_id: &UserId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>>;

    /// Append a delivery log row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_delivery(&self, log: &WebhookDeliveryLog) -> Result<()>;

    /// Delivery log of one subscription, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_deliveries(
        &self,
        webhook_id: &WebhookId,
        limit: usize,
    ) -> Result<Vec<WebhookDeliveryLog>>;

    // =========================================================================
    // Billing and team
    // =========================================================================

    /// Record a billing transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_billing_transaction(&self, transaction: &BillingTransaction) -> Result<()>;

    /// A user's billing transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_billing_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<BillingTransaction>>;

    /// Add a team member.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the owner already invited that email.
    async fn add_team_member(&self, member: &TeamMember) -> Result<()>;

    /// Members of an owner's team, oldest invitation first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_team(&self, owner_id: &UserId) -> Result<Vec<TeamMember>>;
}
