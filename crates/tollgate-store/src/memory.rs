//! In-memory storage implementation.
//!
//! Backs tests and local runs without `DATABASE_URL`. Data lives for the
//! lifetime of the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tollgate_core::{
    BillingTransaction, Plan, Provider, TeamMember, UsageRecord, User, UserId, WaitlistEntry,
    WebhookDeliveryLog, WebhookId, WebhookSubscription,
};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    usage: Vec<UsageRecord>,
    waitlist: BTreeMap<String, WaitlistEntry>,
    webhooks: Vec<WebhookSubscription>,
    deliveries: Vec<WebhookDeliveryLog>,
    billing: Vec<BillingTransaction>,
    team: Vec<TeamMember>,
}

/// Store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `StoreError::Database`
    /// (or succeed again when `false`). Used to exercise outage paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".into()));
        }
        Ok(())
    }
}

/// Sort newest first by `key`, keeping insertion order reversed for ties.
fn newest_first<T: Clone>(rows: &[T], key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().cloned().collect();
    out.sort_by_key(|row| std::cmp::Reverse(key(row)));
    out
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_user(&self, user: &User) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;

        if let Some(key) = &user.api_key {
            let taken = tables
                .users
                .values()
                .any(|u| u.id != user.id && u.api_key.as_deref() == Some(key.as_str()));
            if taken {
                return Err(StoreError::Duplicate {
                    entity: "api key",
                    key: user.id.to_string(),
                });
            }
        }

        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.check()?;
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.api_key.as_deref() == Some(api_key))
            .cloned())
    }

    async fn set_api_key(&self, user_id: &UserId, api_key: &str) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(user_id).ok_or_else(|| StoreError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
        user.api_key = Some(api_key.to_string());
        Ok(())
    }

    async fn set_plan(&self, user_id: &UserId, plan: Plan) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(user_id).ok_or_else(|| StoreError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
        user.plan = plan;
        Ok(())
    }

    async fn insert_usage(&self, record: &UsageRecord) -> Result<()> {
        self.check()?;
        self.tables.write().await.usage.push(record.clone());
        Ok(())
    }

    async fn insert_usage_batch(&self, records: &[UsageRecord]) -> Result<()> {
        self.check()?;
        self.tables
            .write()
            .await
            .usage
            .extend(records.iter().cloned());
        Ok(())
    }

    async fn recent_usage(&self, user_id: &UserId, limit: usize) -> Result<Vec<UsageRecord>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mine: Vec<UsageRecord> = tables
            .usage
            .iter()
            .filter(|r| r.user_id == *user_id)
            .cloned()
            .collect();
        let mut out = newest_first(&mine, |r| r.created_at);
        out.truncate(limit);
        Ok(out)
    }

    async fn usage_between(
        &self,
        user_id: &UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        provider: Option<Provider>,
    ) -> Result<Vec<UsageRecord>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut out: Vec<UsageRecord> = tables
            .usage
            .iter()
            .filter(|r| r.user_id == *user_id)
            .filter(|r| r.created_at >= start && r.created_at <= end)
            .filter(|r| provider.map_or(true, |p| r.provider == p))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }

    async fn add_waitlist(&self, entry: &WaitlistEntry) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.waitlist.contains_key(&entry.email) {
            return Err(StoreError::Duplicate {
                entity: "waitlist entry",
                key: entry.email.clone(),
            });
        }
        tables.waitlist.insert(entry.email.clone(), entry.clone());
        Ok(())
    }

    async fn waitlist_count(&self) -> Result<u64> {
        self.check()?;
        Ok(self.tables.read().await.waitlist.len() as u64)
    }

    async fn list_waitlist(&self, limit: usize, offset: usize) -> Result<Vec<WaitlistEntry>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut entries: Vec<WaitlistEntry> = tables.waitlist.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.email.cmp(&b.email))
        });
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_webhook(&self, webhook: &WebhookSubscription) -> Result<()> {
        self.check()?;
        self.tables.write().await.webhooks.push(webhook.clone());
        Ok(())
    }

    async fn get_webhook(&self, webhook_id: &WebhookId) -> Result<Option<WebhookSubscription>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .webhooks
            .iter()
            .find(|w| w.id == *webhook_id)
            .cloned())
    }

    async fn list_webhooks(&self, user_id: &UserId) -> Result<Vec<WebhookSubscription>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mine: Vec<WebhookSubscription> = tables
            .webhooks
            .iter()
            .filter(|w| w.user_id == *user_id)
            .cloned()
            .collect();
        Ok(newest_first(&mine, |w| w.created_at))
    }

    async fn active_webhooks_for_event(
        &self,
        user_id: &UserId,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscription>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .webhooks
            .iter()
            .filter(|w| w.user_id == *user_id && w.wants(event_type))
            .cloned()
            .collect())
    }

    async fn insert_delivery(&self, log: &WebhookDeliveryLog) -> Result<()> {
        self.check()?;
        self.tables.write().await.deliveries.push(log.clone());
        Ok(())
    }

    async fn list_deliveries(
        &self,
        webhook_id: &WebhookId,
        limit: usize,
    ) -> Result<Vec<WebhookDeliveryLog>> {
        self.check()?;
        let tables = self.tables.read().await;
        let rows: Vec<WebhookDeliveryLog> = tables
            .deliveries
            .iter()
            .filter(|d| d.webhook_id == *webhook_id)
            .cloned()
            .collect();
        let mut out = newest_first(&rows, |d| d.delivered_at);
        out.truncate(limit);
        Ok(out)
    }

    async fn insert_billing_transaction(&self, transaction: &BillingTransaction) -> Result<()> {
        self.check()?;
        self.tables.write().await.billing.push(transaction.clone());
        Ok(())
    }

    async fn list_billing_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<BillingTransaction>> {
        self.check()?;
        let tables = self.tables.read().await;
        let rows: Vec<BillingTransaction> = tables
            .billing
            .iter()
            .filter(|t| t.user_id == *user_id)
            .cloned()
            .collect();
        let mut out = newest_first(&rows, |t| t.created_at);
        out.truncate(limit);
        Ok(out)
    }

    async fn add_team_member(&self, member: &TeamMember) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let exists = tables
            .team
            .iter()
            .any(|m| m.owner_id == member.owner_id && m.email == member.email);
        if exists {
            return Err(StoreError::Duplicate {
                entity: "team member",
                key: member.email.clone(),
            });
        }
        tables.team.push(member.clone());
        Ok(())
    }

    async fn list_team(&self, owner_id: &UserId) -> Result<Vec<TeamMember>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .team
            .iter()
            .filter(|m| m.owner_id == *owner_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tollgate_core::{Metadata, TeamRole};

    fn usage(user_id: UserId, provider: Provider, minutes_ago: i64) -> UsageRecord {
        UsageRecord::new(user_id, provider, None, 10, 5, 0.01, Metadata::new())
            .unwrap()
            .at(Utc::now() - Duration::minutes(minutes_ago))
    }

    #[tokio::test]
    async fn waitlist_rejects_duplicates() {
        let store = MemoryStore::new();
        let entry = WaitlistEntry::new("a@b.co").unwrap();

        store.add_waitlist(&entry).await.unwrap();
        let err = store.add_waitlist(&entry).await.unwrap_err();

        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(store.waitlist_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_usage_is_newest_first_and_scoped() {
        let store = MemoryStore::new();
        let me = UserId::generate();
        let other = UserId::generate();

        store.insert_usage(&usage(me, Provider::OpenAi, 30)).await.unwrap();
        store.insert_usage(&usage(me, Provider::Google, 5)).await.unwrap();
        store.insert_usage(&usage(other, Provider::Anthropic, 1)).await.unwrap();

        let recent = store.recent_usage(&me, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].provider, Provider::Google);

        let limited = store.recent_usage(&me, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn usage_between_filters_window_and_provider() {
        let store = MemoryStore::new();
        let me = UserId::generate();
        store.insert_usage(&usage(me, Provider::OpenAi, 60 * 24 * 40)).await.unwrap();
        store.insert_usage(&usage(me, Provider::OpenAi, 60)).await.unwrap();
        store.insert_usage(&usage(me, Provider::Google, 30)).await.unwrap();

        let start = Utc::now() - Duration::days(30);
        let end = Utc::now();

        let all = store.usage_between(&me, start, end, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at <= all[1].created_at);

        let google = store
            .usage_between(&me, start, end, Some(Provider::Google))
            .await
            .unwrap();
        assert_eq!(google.len(), 1);
    }

    #[tokio::test]
    async fn active_webhooks_match_user_and_event() {
        let store = MemoryStore::new();
        let me = UserId::generate();
        let hook = WebhookSubscription::new(me, "https://example.com/hook", None, None).unwrap();
        let mut inactive =
            WebhookSubscription::new(me, "https://example.com/off", None, None).unwrap();
        inactive.active = false;
        store.insert_webhook(&hook).await.unwrap();
        store.insert_webhook(&inactive).await.unwrap();

        let matched = store
            .active_webhooks_for_event(&me, "usage.tracked")
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, hook.id);

        assert!(store
            .active_webhooks_for_event(&me, "invoice.paid")
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .active_webhooks_for_event(&UserId::generate(), "usage.tracked")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn plan_and_api_key_updates_require_user() {
        let store = MemoryStore::new();
        let id = UserId::generate();

        let err = store.set_plan(&id, Plan::Pro).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        store.put_user(&User::new(id, None)).await.unwrap();
        store.set_plan(&id, Plan::Pro).await.unwrap();
        store.set_api_key(&id, "tg_abc").await.unwrap();

        let found = store.find_user_by_api_key("tg_abc").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.plan, Plan::Pro);
    }

    #[tokio::test]
    async fn team_members_are_unique_per_owner() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let member = TeamMember::invite(owner, "dev@team.io", TeamRole::Member).unwrap();
        store.add_team_member(&member).await.unwrap();

        let again = TeamMember::invite(owner, "DEV@team.io", TeamRole::Admin).unwrap();
        assert!(matches!(
            store.add_team_member(&again).await,
            Err(StoreError::Duplicate { .. })
        ));

        let elsewhere = TeamMember::invite(UserId::generate(), "dev@team.io", TeamRole::Member).unwrap();
        store.add_team_member(&elsewhere).await.unwrap();
        assert_eq!(store.list_team(&owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.waitlist_count().await,
            Err(StoreError::Database(_))
        ));
        store.set_unavailable(false);
        assert_eq!(store.waitlist_count().await.unwrap(), 0);
    }
}
