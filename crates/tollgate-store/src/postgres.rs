//! PostgreSQL storage implementation.
//!
//! Queries are built at runtime (`sqlx::query`) so the crate compiles without
//! a live database; the schema comes from the embedded migrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use tollgate_core::{
    BillingTransaction, BillingTransactionId, DeliveryId, Metadata, Plan, Provider, TeamMember,
    TeamMemberId, UsageRecord, UsageRecordId, User, UserId, WaitlistEntry, WebhookDeliveryLog,
    WebhookId, WebhookSubscription,
};

use crate::error::{Result, StoreError};
use crate::Store;

/// Maximum pooled connections.
const MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL-backed storage.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!("PostgreSQL store initialized");
        Ok(store)
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::Serialization(format!("{value} exceeds BIGINT")))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::Serialization(format!("negative count {value}")))
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn unique_violation(entity: &'static str, key: String) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Duplicate { entity, key }
        }
        _ => StoreError::Database(err.to_string()),
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let plan: String = row.try_get("plan")?;
    Ok(User {
        id: UserId::from(row.try_get::<Uuid, _>("id")?),
        email: row.try_get("email")?,
        api_key: row.try_get("api_key")?,
        plan: plan.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

fn usage_from_row(row: &PgRow) -> Result<UsageRecord> {
    let provider: String = row.try_get("provider")?;
    let metadata: serde_json::Value = row.try_get("metadata")?;
    let metadata: Metadata = match metadata {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    };
    Ok(UsageRecord {
        id: UsageRecordId::from(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from(row.try_get::<Uuid, _>("user_id")?),
        provider: provider.parse()?,
        model: row.try_get("model")?,
        input_tokens: to_u64(row.try_get("input_tokens")?)?,
        output_tokens: to_u64(row.try_get("output_tokens")?)?,
        total_tokens: to_u64(row.try_get("total_tokens")?)?,
        cost: row.try_get("cost")?,
        metadata,
        created_at: row.try_get("created_at")?,
    })
}

fn webhook_from_row(row: &PgRow) -> Result<WebhookSubscription> {
    Ok(WebhookSubscription {
        id: WebhookId::from(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from(row.try_get::<Uuid, _>("user_id")?),
        url: row.try_get("url")?,
        events: row.try_get("events")?,
        secret: row.try_get("secret")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn delivery_from_row(row: &PgRow) -> Result<WebhookDeliveryLog> {
    let status: i32 = row.try_get("response_status")?;
    Ok(WebhookDeliveryLog {
        id: DeliveryId::from(row.try_get::<Uuid, _>("id")?),
        webhook_id: WebhookId::from(row.try_get::<Uuid, _>("webhook_id")?),
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        response_status: u16::try_from(status)
            .map_err(|_| StoreError::Serialization(format!("bad status {status}")))?,
        response_body: row.try_get("response_body")?,
        success: row.try_get("success")?,
        delivered_at: row.try_get("delivered_at")?,
    })
}

fn billing_from_row(row: &PgRow) -> Result<BillingTransaction> {
    let kind: String = row.try_get("kind")?;
    Ok(BillingTransaction {
        id: BillingTransactionId::from(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from(row.try_get::<Uuid, _>("user_id")?),
        amount_cents: row.try_get("amount_cents")?,
        kind: kind.parse()?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn team_from_row(row: &PgRow) -> Result<TeamMember> {
    let role: String = row.try_get("role")?;
    Ok(TeamMember {
        id: TeamMemberId::from(row.try_get::<Uuid, _>("id")?),
        owner_id: UserId::from(row.try_get::<Uuid, _>("owner_id")?),
        email: row.try_get("email")?,
        role: role.parse()?,
        invited_at: row.try_get("invited_at")?,
    })
}

const USAGE_COLUMNS: &str = "id, user_id, provider, model, input_tokens, output_tokens, \
                             total_tokens, cost, metadata, created_at";

const INSERT_USAGE: &str = "INSERT INTO usage_tracking \
     (id, user_id, provider, model, input_tokens, output_tokens, total_tokens, cost, metadata, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)";

fn bind_usage<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    record: &'q UsageRecord,
) -> Result<sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>> {
    Ok(query
        .bind(*record.id.as_uuid())
        .bind(*record.user_id.as_uuid())
        .bind(record.provider.as_str())
        .bind(record.model.as_deref())
        .bind(to_i64(record.input_tokens)?)
        .bind(to_i64(record.output_tokens)?)
        .bind(to_i64(record.total_tokens)?)
        .bind(record.cost)
        .bind(serde_json::Value::Object(record.metadata.clone()))
        .bind(record.created_at))
}

#[async_trait]
impl Store for PgStore {
    async fn put_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, api_key, plan, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE \
             SET email = EXCLUDED.email, api_key = EXCLUDED.api_key, plan = EXCLUDED.plan",
        )
        .bind(*user.id.as_uuid())
        .bind(user.email.as_deref())
        .bind(user.api_key.as_deref())
        .bind(user.plan.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation("api key", user.id.to_string()))?;
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        sqlx::query("SELECT id, email, api_key, plan, created_at FROM users WHERE id = $1")
            .bind(*user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        sqlx::query("SELECT id, email, api_key, plan, created_at FROM users WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn set_api_key(&self, user_id: &UserId, api_key: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET api_key = $2 WHERE id = $1")
            .bind(*user_id.as_uuid())
            .bind(api_key)
            .execute(&self.pool)
            .await
            .map_err(unique_violation("api key", user_id.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_plan(&self, user_id: &UserId, plan: Plan) -> Result<()> {
        let result = sqlx::query("UPDATE users SET plan = $2 WHERE id = $1")
            .bind(*user_id.as_uuid())
            .bind(plan.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_usage(&self, record: &UsageRecord) -> Result<()> {
        bind_usage(sqlx::query(INSERT_USAGE), record)?
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_usage_batch(&self, records: &[UsageRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            bind_usage(sqlx::query(INSERT_USAGE), record)?
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn recent_usage(&self, user_id: &UserId, limit: usize) -> Result<Vec<UsageRecord>> {
        let sql = format!(
            "SELECT {USAGE_COLUMNS} FROM usage_tracking WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        );
        sqlx::query(&sql)
            .bind(*user_id.as_uuid())
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(usage_from_row)
            .collect()
    }

    async fn usage_between(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        provider: Option<Provider>,
    ) -> Result<Vec<UsageRecord>> {
        let sql = format!(
            "SELECT {USAGE_COLUMNS} FROM usage_tracking \
             WHERE user_id = $1 AND created_at >= $2 AND created_at <= $3 \
             AND ($4::TEXT IS NULL OR provider = $4) \
             ORDER BY created_at ASC"
        );
        sqlx::query(&sql)
            .bind(*user_id.as_uuid())
            .bind(start)
            .bind(end)
            .bind(provider.map(|p| p.as_str()))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(usage_from_row)
            .collect()
    }

    async fn add_waitlist(&self, entry: &WaitlistEntry) -> Result<()> {
        sqlx::query("INSERT INTO waitlist (email, created_at) VALUES ($1, $2)")
            .bind(&entry.email)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await
            .map_err(unique_violation("waitlist entry", entry.email.clone()))?;
        Ok(())
    }

    async fn waitlist_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM waitlist")
            .fetch_one(&self.pool)
            .await?;
        to_u64(row.try_get("count")?)
    }

    async fn list_waitlist(&self, limit: usize, offset: usize) -> Result<Vec<WaitlistEntry>> {
        let rows = sqlx::query(
            "SELECT email, created_at FROM waitlist \
             ORDER BY created_at DESC, email ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit_param(limit))
        .bind(limit_param(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(WaitlistEntry {
                    email: row.try_get("email")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn insert_webhook(&self, webhook: &WebhookSubscription) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhooks (id, user_id, url, events, secret, active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(*webhook.id.as_uuid())
        .bind(*webhook.user_id.as_uuid())
        .bind(&webhook.url)
        .bind(&webhook.events)
        .bind(webhook.secret.as_deref())
        .bind(webhook.active)
        .bind(webhook.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_webhook(&self, webhook_id: &WebhookId) -> Result<Option<WebhookSubscription>> {
        sqlx::query(
            "SELECT id, user_id, url, events, secret, active, created_at FROM webhooks WHERE id = $1",
        )
        .bind(*webhook_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(webhook_from_row)
        .transpose()
    }

    async fn list_webhooks(&self, user_id: &UserId) -> Result<Vec<WebhookSubscription>> {
        sqlx::query(
            "SELECT id, user_id, url, events, secret, active, created_at FROM webhooks \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(*user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(webhook_from_row)
        .collect()
    }

    async fn active_webhooks_for_event(
        &self,
        user_id: &UserId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>> {
        sqlx::query(
            "SELECT id, user_id, url, events, secret, active, created_at FROM webhooks \
             WHERE user_id = $1 AND active = TRUE AND $2 = ANY(events)",
        )
        .bind(*user_id.as_uuid())
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(webhook_from_row)
        .collect()
    }

    async fn insert_delivery(&self, log: &WebhookDeliveryLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO webhook_deliveries \
             (id, webhook_id, event_type, payload, response_status, response_body, success, delivered_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*log.id.as_uuid())
        .bind(*log.webhook_id.as_uuid())
        .bind(&log.event_type)
        .bind(&log.payload)
        .bind(i32::from(log.response_status))
        .bind(&log.response_body)
        .bind(log.success)
        .bind(log.delivered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_deliveries(
        &self,
        webhook_id: &WebhookId,
        limit: usize,
    ) -> Result<Vec<WebhookDeliveryLog>> {
        sqlx::query(
            "SELECT id, webhook_id, event_type, payload, response_status, response_body, success, \
             delivered_at FROM webhook_deliveries WHERE webhook_id = $1 \
             ORDER BY delivered_at DESC LIMIT $2",
        )
        .bind(*webhook_id.as_uuid())
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(delivery_from_row)
        .collect()
    }

    async fn insert_billing_transaction(&self, transaction: &BillingTransaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO billing_transactions (id, user_id, amount_cents, kind, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*transaction.id.as_uuid())
        .bind(*transaction.user_id.as_uuid())
        .bind(transaction.amount_cents)
        .bind(transaction.kind.as_str())
        .bind(&transaction.description)
        .bind(transaction.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_billing_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<BillingTransaction>> {
        sqlx::query(
            "SELECT id, user_id, amount_cents, kind, description, created_at \
             FROM billing_transactions WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(*user_id.as_uuid())
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(billing_from_row)
        .collect()
    }

    async fn add_team_member(&self, member: &TeamMember) -> Result<()> {
        sqlx::query(
            "INSERT INTO team_members (id, owner_id, email, role, invited_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*member.id.as_uuid())
        .bind(*member.owner_id.as_uuid())
        .bind(&member.email)
        .bind(member.role.as_str())
        .bind(member.invited_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation("team member", member.email.clone()))?;
        Ok(())
    }

    async fn list_team(&self, owner_id: &UserId) -> Result<Vec<TeamMember>> {
        sqlx::query(
            "SELECT id, owner_id, email, role, invited_at FROM team_members \
             WHERE owner_id = $1 ORDER BY invited_at ASC",
        )
        .bind(*owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(team_from_row)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_counts_round_trip_through_bigint() {
        assert_eq!(to_i64(42).unwrap(), 42);
        assert!(to_i64(u64::MAX).is_err());
        assert_eq!(to_u64(7).unwrap(), 7);
        assert!(to_u64(-1).is_err());
    }

    #[test]
    fn limits_saturate() {
        assert_eq!(limit_param(20), 20);
        assert_eq!(limit_param(usize::MAX), i64::MAX);
    }
}
