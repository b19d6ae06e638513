use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use super::events::{SubscriptionEvent, SubscriptionEventSink, SubscriptionEventType};
use super::store::SubscriptionStore;

/// key: subscription-expiry-sweep -> mark overdue active subscriptions expired
#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<dyn SubscriptionStore>,
    events: Arc<dyn SubscriptionEventSink>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn SubscriptionStore>, events: Arc<dyn SubscriptionEventSink>) -> Self {
        Self { store, events }
    }

    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.process_tick(Utc::now()).await {
                    warn!(?err, "subscription expiry sweep tick failed");
                }
            }
        })
    }

    /// Returns how many subscriptions were moved to `EXPIRED`.
    pub async fn process_tick(&self, now: DateTime<Utc>) -> Result<usize> {
        let overdue = self.store.list_overdue_active(now).await?;
        if overdue.is_empty() {
            debug!("no overdue subscriptions");
            return Ok(0);
        }

        let mut expired = 0;
        for subscription in overdue {
            match self.store.expire_if_overdue(subscription.id, now).await {
                Ok(Some(updated)) => {
                    info!(
                        user_id = updated.user_id,
                        subscription_id = updated.id,
                        end_date = ?updated.end_date,
                        "expired subscription past its end date"
                    );
                    self.events.emit(SubscriptionEvent::subscription(
                        SubscriptionEventType::SubscriptionExpired,
                        &updated,
                        now,
                    ));
                    expired += 1;
                }
                Ok(None) => debug!(
                    subscription_id = subscription.id,
                    "subscription changed since it was listed; left as is"
                ),
                Err(err) => warn!(
                    ?err,
                    user_id = subscription.user_id,
                    subscription_id = subscription.id,
                    "failed to expire subscription"
                ),
            }
        }

        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::events::RecordingEventSink;
    use crate::subscriptions::memory::InMemorySubscriptionStore;
    use crate::subscriptions::models::{
        NewPlanRecord, NewSubscriptionRecord, Plan, Subscription, SubscriptionStatus,
    };
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    /// Changes the user's plan right after the sweep has listed its candidates.
    struct PlanChangeDuringSweep {
        inner: InMemorySubscriptionStore,
        new_end_date: DateTime<Utc>,
    }

    #[async_trait]
    impl SubscriptionStore for PlanChangeDuringSweep {
        async fn insert_plan(&self, plan: &NewPlanRecord) -> sqlx::Result<Plan> {
            self.inner.insert_plan(plan).await
        }

        async fn find_plan(&self, plan_id: i64) -> sqlx::Result<Option<Plan>> {
            self.inner.find_plan(plan_id).await
        }

        async fn list_plans(&self, skip: i64, limit: i64) -> sqlx::Result<Vec<Plan>> {
            self.inner.list_plans(skip, limit).await
        }

        async fn insert_subscription(
            &self,
            subscription: &NewSubscriptionRecord,
        ) -> sqlx::Result<Subscription> {
            self.inner.insert_subscription(subscription).await
        }

        async fn find_active_subscription(
            &self,
            user_id: i64,
        ) -> sqlx::Result<Option<Subscription>> {
            self.inner.find_active_subscription(user_id).await
        }

        async fn update_subscription(
            &self,
            subscription: &Subscription,
        ) -> sqlx::Result<Subscription> {
            self.inner.update_subscription(subscription).await
        }

        async fn list_overdue_active(
            &self,
            now: DateTime<Utc>,
        ) -> sqlx::Result<Vec<Subscription>> {
            let listed = self.inner.list_overdue_active(now).await?;
            for subscription in &listed {
                let mut changed = subscription.clone();
                changed.plan_id = 2;
                changed.end_date = Some(self.new_end_date);
                changed.updated_at = now;
                self.inner.update_subscription(&changed).await?;
            }
            Ok(listed)
        }

        async fn expire_if_overdue(
            &self,
            subscription_id: i64,
            now: DateTime<Utc>,
        ) -> sqlx::Result<Option<Subscription>> {
            self.inner.expire_if_overdue(subscription_id, now).await
        }
    }

    async fn seed(
        store: &InMemorySubscriptionStore,
        user_id: i64,
        status: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
    ) {
        let start = Utc::now() - ChronoDuration::days(60);
        store
            .insert_subscription(&NewSubscriptionRecord {
                user_id,
                plan_id: 1,
                status,
                start_date: start,
                end_date,
                created_at: start,
                updated_at: start,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sweep_only_expires_overdue_active_rows() {
        let store = InMemorySubscriptionStore::new();
        let events = Arc::new(RecordingEventSink::new());
        let now = Utc::now();

        seed(&store, 1, SubscriptionStatus::Active, Some(now - ChronoDuration::days(1))).await;
        seed(&store, 2, SubscriptionStatus::Active, Some(now + ChronoDuration::days(1))).await;
        seed(&store, 3, SubscriptionStatus::Cancelled, Some(now - ChronoDuration::days(1))).await;
        seed(&store, 4, SubscriptionStatus::Active, None).await;

        let sweeper = ExpirySweeper::new(Arc::new(store.clone()), events.clone());
        assert_eq!(sweeper.process_tick(now).await.unwrap(), 1);

        let statuses: Vec<_> = store
            .subscriptions()
            .await
            .into_iter()
            .map(|subscription| (subscription.user_id, subscription.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (1, SubscriptionStatus::Expired),
                (2, SubscriptionStatus::Active),
                (3, SubscriptionStatus::Cancelled),
                (4, SubscriptionStatus::Active),
            ]
        );
        assert_eq!(
            events.event_types(),
            vec![SubscriptionEventType::SubscriptionExpired]
        );

        assert_eq!(sweeper.process_tick(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_keeps_plan_change_made_after_listing() {
        let store = InMemorySubscriptionStore::new();
        let events = Arc::new(RecordingEventSink::new());
        let now = Utc::now();
        seed(&store, 7, SubscriptionStatus::Active, Some(now - ChronoDuration::days(1))).await;

        let racing = PlanChangeDuringSweep {
            inner: store.clone(),
            new_end_date: now + ChronoDuration::days(365),
        };
        let sweeper = ExpirySweeper::new(Arc::new(racing), events.clone());
        assert_eq!(sweeper.process_tick(now).await.unwrap(), 0);

        let rows = store.subscriptions().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].plan_id, 2);
        assert_eq!(rows[0].status, SubscriptionStatus::Active);
        assert_eq!(rows[0].end_date, Some(now + ChronoDuration::days(365)));
        assert!(events.events().is_empty());
    }
}
