use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::clock::Clock;
use super::events::{SubscriptionEvent, SubscriptionEventSink, SubscriptionEventType};
use super::models::{NewPlan, NewPlanRecord, Plan};
use super::store::SubscriptionStore;
use super::{SubscriptionError, SubscriptionResult};

/// key: plan-catalog -> registration,lookup,paging
#[derive(Clone)]
pub struct PlanCatalog {
    store: Arc<dyn SubscriptionStore>,
    events: Arc<dyn SubscriptionEventSink>,
    clock: Arc<dyn Clock>,
}

impl PlanCatalog {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        events: Arc<dyn SubscriptionEventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            events,
            clock,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    pub(crate) fn events(&self) -> &Arc<dyn SubscriptionEventSink> {
        &self.events
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn create_plan(&self, plan: NewPlan) -> SubscriptionResult<Plan> {
        let now = self.clock.now();
        validate_plan(&plan, now)?;

        let stored = self
            .store
            .insert_plan(&NewPlanRecord {
                name: plan.name,
                price: plan.price,
                features: plan.features,
                duration_days: plan.duration_days,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.events.emit(SubscriptionEvent::plan(
            SubscriptionEventType::PlanCreated,
            &stored,
            now,
        ));
        Ok(stored)
    }

    /// A missing plan is `Ok(None)`; callers decide whether that is an error.
    pub async fn get_plan(&self, plan_id: i64) -> SubscriptionResult<Option<Plan>> {
        Ok(self.store.find_plan(plan_id).await?)
    }

    pub async fn list_plans(&self, skip: i64, limit: i64) -> SubscriptionResult<Vec<Plan>> {
        if skip < 0 {
            return Err(SubscriptionError::Validation(
                "skip must be non-negative".into(),
            ));
        }
        if limit < 0 {
            return Err(SubscriptionError::Validation(
                "limit must be non-negative".into(),
            ));
        }
        Ok(self.store.list_plans(skip, limit).await?)
    }
}

fn validate_plan(plan: &NewPlan, now: DateTime<Utc>) -> SubscriptionResult<()> {
    if plan.name.trim().is_empty() {
        return Err(SubscriptionError::Validation("plan name required".into()));
    }
    if !plan.price.is_finite() || plan.price < 0.0 {
        return Err(SubscriptionError::Validation(
            "plan price must be a non-negative number".into(),
        ));
    }
    if plan.duration_days <= 0 {
        return Err(SubscriptionError::Validation(
            "plan duration_days must be positive".into(),
        ));
    }
    // A subscription started now must still get a representable end date.
    if now
        .checked_add_signed(Duration::days(i64::from(plan.duration_days)))
        .is_none()
    {
        return Err(SubscriptionError::Validation(format!(
            "plan duration of {} days is out of range",
            plan.duration_days
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::clock::ManualClock;
    use crate::subscriptions::events::RecordingEventSink;
    use crate::subscriptions::memory::InMemorySubscriptionStore;
    use chrono::TimeZone;

    fn catalog() -> (PlanCatalog, Arc<RecordingEventSink>, Arc<ManualClock>) {
        let events = Arc::new(RecordingEventSink::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        ));
        let catalog = PlanCatalog::new(
            Arc::new(InMemorySubscriptionStore::new()),
            events.clone(),
            clock.clone(),
        );
        (catalog, events, clock)
    }

    fn new_plan(name: &str, price: f64, duration_days: i32) -> NewPlan {
        NewPlan {
            name: name.to_string(),
            price,
            features: "priority support".to_string(),
            duration_days,
        }
    }

    #[tokio::test]
    async fn create_plan_keeps_fields_and_stamps_once() {
        let (catalog, events, clock) = catalog();

        let plan = catalog.create_plan(new_plan("Pro", 9.99, 30)).await.unwrap();

        assert_eq!(plan.id, 1);
        assert_eq!(plan.name, "Pro");
        assert_eq!(plan.price, 9.99);
        assert_eq!(plan.features, "priority support");
        assert_eq!(plan.duration_days, 30);
        assert_eq!(plan.created_at, clock.now());
        assert_eq!(plan.created_at, plan.updated_at);
        assert_eq!(events.event_types(), vec![SubscriptionEventType::PlanCreated]);
    }

    #[tokio::test]
    async fn free_plan_with_empty_features_is_valid() {
        let (catalog, _, _) = catalog();
        let mut plan = new_plan("Free", 0.0, 7);
        plan.features = String::new();

        let stored = catalog.create_plan(plan).await.unwrap();
        assert_eq!(stored.price, 0.0);
        assert!(stored.features.is_empty());
    }

    #[tokio::test]
    async fn invalid_plans_are_rejected_before_storage() {
        let (catalog, events, _) = catalog();

        for plan in [
            new_plan("   ", 1.0, 30),
            new_plan("Negative", -0.01, 30),
            new_plan("NaN", f64::NAN, 30),
            new_plan("Zero days", 1.0, 0),
            new_plan("Negative days", 1.0, -5),
            new_plan("Forever", 1.0, 2_000_000_000),
        ] {
            let err = catalog.create_plan(plan).await.unwrap_err();
            assert!(matches!(err, SubscriptionError::Validation(_)), "{err}");
        }

        assert!(catalog.list_plans(0, 100).await.unwrap().is_empty());
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn get_plan_reports_missing_as_none() {
        let (catalog, _, _) = catalog();
        let plan = catalog.create_plan(new_plan("Pro", 9.99, 30)).await.unwrap();

        assert_eq!(catalog.get_plan(plan.id).await.unwrap(), Some(plan));
        assert_eq!(catalog.get_plan(404).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_plans_pages_by_id_and_rejects_negative_bounds() {
        let (catalog, _, clock) = catalog();
        for (index, name) in ["Free", "Pro", "Team"].into_iter().enumerate() {
            clock.advance(Duration::minutes(index as i64));
            catalog.create_plan(new_plan(name, 1.0, 30)).await.unwrap();
        }

        let page = catalog.list_plans(1, 100).await.unwrap();
        let ids: Vec<_> = page.iter().map(|plan| plan.id).collect();
        assert_eq!(ids, vec![2, 3]);

        assert!(matches!(
            catalog.list_plans(-1, 10).await,
            Err(SubscriptionError::Validation(_))
        ));
        assert!(matches!(
            catalog.list_plans(0, -1).await,
            Err(SubscriptionError::Validation(_))
        ));
    }
}
