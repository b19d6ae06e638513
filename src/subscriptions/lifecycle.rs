use chrono::{DateTime, Duration, Utc};

use super::catalog::PlanCatalog;
use super::clock::Clock;
use super::events::{SubscriptionEvent, SubscriptionEventSink, SubscriptionEventType};
use super::models::{
    FieldUpdate, NewSubscriptionRecord, Plan, Subscription, SubscriptionPatch,
    SubscriptionRecord, SubscriptionStatus,
};
use super::{SubscriptionError, SubscriptionResult};

#[derive(Clone, Debug, Default)]
pub struct LifecycleConfig {
    /// Reject creation while the user still has an `ACTIVE` subscription.
    pub enforce_single_active: bool,
}

/// key: subscription-lifecycle -> create,lookup,update,cancel
#[derive(Clone)]
pub struct SubscriptionLifecycle {
    catalog: PlanCatalog,
    config: LifecycleConfig,
}

impl SubscriptionLifecycle {
    pub fn new(catalog: PlanCatalog, config: LifecycleConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub async fn create_subscription(
        &self,
        user_id: i64,
        plan_id: i64,
    ) -> SubscriptionResult<SubscriptionRecord> {
        let plan = self.require_plan(plan_id).await?;

        if self.config.enforce_single_active
            && self
                .catalog
                .store()
                .find_active_subscription(user_id)
                .await?
                .is_some()
        {
            return Err(SubscriptionError::ActiveSubscriptionExists(user_id));
        }

        let now = self.catalog.clock().now();
        let end_date = end_date_for(now, &plan)?;
        let subscription = self
            .catalog
            .store()
            .insert_subscription(&NewSubscriptionRecord {
                user_id,
                plan_id: plan.id,
                status: SubscriptionStatus::Active,
                start_date: now,
                end_date: Some(end_date),
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.emit(SubscriptionEventType::SubscriptionCreated, &subscription, now);
        Ok(SubscriptionRecord { subscription, plan })
    }

    /// No active subscription is `Ok(None)`, not an error.
    pub async fn get_active_subscription(
        &self,
        user_id: i64,
    ) -> SubscriptionResult<Option<SubscriptionRecord>> {
        let Some(subscription) = self
            .catalog
            .store()
            .find_active_subscription(user_id)
            .await?
        else {
            return Ok(None);
        };

        let plan = self.require_plan(subscription.plan_id).await?;
        Ok(Some(SubscriptionRecord { subscription, plan }))
    }

    /// Applies only the fields present in `patch` to the user's active subscription.
    ///
    /// A new `plan_id` restarts the validity window from the update time; `start_date`
    /// stays as it was. The supplied `status` never affects `end_date`.
    pub async fn update_subscription(
        &self,
        user_id: i64,
        patch: SubscriptionPatch,
    ) -> SubscriptionResult<SubscriptionRecord> {
        let mut subscription = self.require_active(user_id).await?;

        if matches!(patch.plan_id, FieldUpdate::Null) {
            return Err(SubscriptionError::Validation(
                "plan_id cannot be cleared".into(),
            ));
        }
        if matches!(patch.status, FieldUpdate::Null) {
            return Err(SubscriptionError::Validation(
                "status cannot be cleared".into(),
            ));
        }

        if let FieldUpdate::Value(status) = patch.status {
            subscription.status = status;
        }
        if let FieldUpdate::Value(plan_id) = patch.plan_id {
            subscription.plan_id = plan_id;
        }

        let now = self.catalog.clock().now();
        let plan = self.require_plan(subscription.plan_id).await?;
        if patch.plan_id.is_present() {
            subscription.end_date = Some(end_date_for(now, &plan)?);
        }
        subscription.updated_at = now;

        let subscription = self
            .catalog
            .store()
            .update_subscription(&subscription)
            .await?;

        self.emit(SubscriptionEventType::SubscriptionUpdated, &subscription, now);
        Ok(SubscriptionRecord { subscription, plan })
    }

    pub async fn cancel_subscription(&self, user_id: i64) -> SubscriptionResult<SubscriptionRecord> {
        let mut subscription = self.require_active(user_id).await?;
        let plan = self.require_plan(subscription.plan_id).await?;

        let now = self.catalog.clock().now();
        subscription.status = SubscriptionStatus::Cancelled;
        subscription.updated_at = now;

        let subscription = self
            .catalog
            .store()
            .update_subscription(&subscription)
            .await?;

        self.emit(SubscriptionEventType::SubscriptionCancelled, &subscription, now);
        Ok(SubscriptionRecord { subscription, plan })
    }

    async fn require_plan(&self, plan_id: i64) -> SubscriptionResult<Plan> {
        self.catalog
            .get_plan(plan_id)
            .await?
            .ok_or(SubscriptionError::PlanNotFound(plan_id))
    }

    async fn require_active(&self, user_id: i64) -> SubscriptionResult<Subscription> {
        self.catalog
            .store()
            .find_active_subscription(user_id)
            .await?
            .ok_or(SubscriptionError::SubscriptionNotFound(user_id))
    }

    fn emit(
        &self,
        event_type: SubscriptionEventType,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) {
        self.catalog
            .events()
            .emit(SubscriptionEvent::subscription(event_type, subscription, now));
    }
}

fn end_date_for(start: DateTime<Utc>, plan: &Plan) -> SubscriptionResult<DateTime<Utc>> {
    start
        .checked_add_signed(Duration::days(i64::from(plan.duration_days)))
        .ok_or_else(|| {
            SubscriptionError::Validation(format!(
                "plan {} duration of {} days is out of range",
                plan.id, plan.duration_days
            ))
        })
}
