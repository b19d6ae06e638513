use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::models::{
    NewPlanRecord, NewSubscriptionRecord, Plan, Subscription, SubscriptionStatus,
};
use super::store::SubscriptionStore;

/// key: subscription-store -> in-memory
/// Process-local store; ids start at 1 and increase per table.
#[derive(Clone, Default)]
pub struct InMemorySubscriptionStore {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    plans: BTreeMap<i64, Plan>,
    subscriptions: BTreeMap<i64, Subscription>,
    next_plan_id: i64,
    next_subscription_id: i64,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every subscription row, ordered by id.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.inner
            .read()
            .await
            .subscriptions
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert_plan(&self, plan: &NewPlanRecord) -> sqlx::Result<Plan> {
        let mut tables = self.inner.write().await;
        tables.next_plan_id += 1;
        let stored = Plan {
            id: tables.next_plan_id,
            name: plan.name.clone(),
            price: plan.price,
            features: plan.features.clone(),
            duration_days: plan.duration_days,
            created_at: plan.created_at,
            updated_at: plan.updated_at,
        };
        tables.plans.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_plan(&self, plan_id: i64) -> sqlx::Result<Option<Plan>> {
        Ok(self.inner.read().await.plans.get(&plan_id).cloned())
    }

    async fn list_plans(&self, skip: i64, limit: i64) -> sqlx::Result<Vec<Plan>> {
        let skip = usize::try_from(skip).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .inner
            .read()
            .await
            .plans
            .values()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_subscription(
        &self,
        subscription: &NewSubscriptionRecord,
    ) -> sqlx::Result<Subscription> {
        let mut tables = self.inner.write().await;
        tables.next_subscription_id += 1;
        let stored = Subscription {
            id: tables.next_subscription_id,
            user_id: subscription.user_id,
            plan_id: subscription.plan_id,
            status: subscription.status,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            created_at: subscription.created_at,
            updated_at: subscription.updated_at,
        };
        tables.subscriptions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_active_subscription(&self, user_id: i64) -> sqlx::Result<Option<Subscription>> {
        Ok(self
            .inner
            .read()
            .await
            .subscriptions
            .values()
            .find(|subscription| subscription.user_id == user_id && subscription.is_active())
            .cloned())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> sqlx::Result<Subscription> {
        let mut tables = self.inner.write().await;
        let Some(existing) = tables.subscriptions.get_mut(&subscription.id) else {
            return Err(sqlx::Error::RowNotFound);
        };
        *existing = subscription.clone();
        Ok(existing.clone())
    }

    async fn list_overdue_active(&self, now: DateTime<Utc>) -> sqlx::Result<Vec<Subscription>> {
        Ok(self
            .inner
            .read()
            .await
            .subscriptions
            .values()
            .filter(|subscription| subscription.is_overdue(now))
            .cloned()
            .collect())
    }

    async fn expire_if_overdue(
        &self,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Option<Subscription>> {
        let mut tables = self.inner.write().await;
        let Some(existing) = tables
            .subscriptions
            .get_mut(&subscription_id)
            .filter(|subscription| subscription.is_overdue(now))
        else {
            return Ok(None);
        };
        existing.status = SubscriptionStatus::Expired;
        existing.updated_at = now;
        Ok(Some(existing.clone()))
    }
}
