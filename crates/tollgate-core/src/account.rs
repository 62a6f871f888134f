//! Account types backing the customer dashboards.
//!
//! Users, their plan, billing history and team members.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::signing::random_token;
use crate::{BillingTransactionId, TeamMemberId, UserId};

// ============================================================================
// Constants
// ============================================================================

/// Prefix of every issued API key.
pub const API_KEY_PREFIX: &str = "tg_";

/// Random characters following the API key prefix.
pub const API_KEY_RANDOM_LEN: usize = 32;

/// Starter plan monthly price in cents ($29).
pub const STARTER_PLAN_PRICE_CENTS: i64 = 2900;

/// Pro plan monthly price in cents ($99).
pub const PRO_PLAN_PRICE_CENTS: i64 = 9900;

/// A platform user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (the session `sub` claim).
    pub id: UserId,

    /// Contact email, if known.
    pub email: Option<String>,

    /// API key for the public ingestion API.
    pub api_key: Option<String>,

    /// Current plan.
    pub plan: Plan,

    /// When the user row was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a free-plan user without an API key.
    #[must_use]
    pub fn new(id: UserId, email: Option<String>) -> Self {
        Self {
            id,
            email,
            api_key: None,
            plan: Plan::Free,
            created_at: Utc::now(),
        }
    }
}

/// Generate a fresh API key (`tg_` followed by 32 alphanumerics).
#[must_use]
pub fn generate_api_key() -> String {
    format!("{API_KEY_PREFIX}{}", random_token(API_KEY_RANDOM_LEN))
}

/// Available plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Free tier: $0/month, 100k tokens/month.
    #[default]
    Free,

    /// Starter: $29/month, 2M tokens/month.
    Starter,

    /// Pro: $99/month, 10M tokens/month.
    Pro,

    /// Enterprise: custom pricing, no token cap.
    Enterprise,
}

impl Plan {
    /// Monthly price in cents (0 for custom-priced plans).
    #[must_use]
    pub const fn monthly_price_cents(&self) -> i64 {
        match self {
            Self::Starter => STARTER_PLAN_PRICE_CENTS,
            Self::Pro => PRO_PLAN_PRICE_CENTS,
            Self::Free | Self::Enterprise => 0,
        }
    }

    /// Included tokens per month; `None` means unlimited.
    #[must_use]
    pub const fn monthly_token_allowance(&self) -> Option<u64> {
        match self {
            Self::Free => Some(100_000),
            Self::Starter => Some(2_000_000),
            Self::Pro => Some(10_000_000),
            Self::Enterprise => None,
        }
    }

    /// Plan name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(CoreError::UnknownPlan(other.to_string())),
        }
    }
}

/// A billing ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingTransaction {
    /// Transaction ID.
    pub id: BillingTransactionId,

    /// The billed user.
    pub user_id: UserId,

    /// Amount in cents. Positive = charge, negative = credit or refund.
    pub amount_cents: i64,

    /// Kind of transaction.
    pub kind: TransactionKind,

    /// Human-readable description.
    pub description: String,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl BillingTransaction {
    /// Charge for switching to `plan`.
    #[must_use]
    pub fn subscription(user_id: UserId, plan: Plan) -> Self {
        Self {
            id: BillingTransactionId::generate(),
            user_id,
            amount_cents: plan.monthly_price_cents(),
            kind: TransactionKind::Subscription,
            description: format!("Subscription changed to {plan} plan"),
            created_at: Utc::now(),
        }
    }
}

/// Kind of billing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Plan fee.
    Subscription,
    /// Metered usage charge.
    Usage,
    /// Account credit.
    Credit,
    /// Refund.
    Refund,
}

impl TransactionKind {
    /// Kind name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Usage => "usage",
            Self::Credit => "credit",
            Self::Refund => "refund",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(Self::Subscription),
            "usage" => Ok(Self::Usage),
            "credit" => Ok(Self::Credit),
            "refund" => Ok(Self::Refund),
            other => Err(CoreError::UnknownTransactionKind(other.to_string())),
        }
    }
}

/// A member of a user's team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    /// Membership ID.
    pub id: TeamMemberId,

    /// The account owner that invited this member.
    pub owner_id: UserId,

    /// Member email (normalized).
    pub email: String,

    /// Member role.
    pub role: TeamRole,

    /// When the invitation was sent.
    pub invited_at: DateTime<Utc>,
}

impl TeamMember {
    /// Invite `email` to `owner_id`'s team.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidEmail` if the address is malformed.
    pub fn invite(owner_id: UserId, email: &str, role: TeamRole) -> Result<Self, CoreError> {
        Ok(Self {
            id: TeamMemberId::generate(),
            owner_id,
            email: crate::waitlist::normalize_email(email)?,
            role,
            invited_at: Utc::now(),
        })
    }
}

/// Role of a team member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    /// Account owner.
    Owner,
    /// Can manage billing and members.
    Admin,
    /// Read-only dashboard access.
    #[default]
    Member,
}

impl TeamRole {
    /// Role name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl FromStr for TeamRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}
