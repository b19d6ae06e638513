use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{Plan, Subscription, SubscriptionStatus};

/// key: subscription-lifecycle-event
/// Structured envelope emitted whenever a plan or subscription is written.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionEvent {
    pub id: Uuid,
    pub event_type: SubscriptionEventType,
    pub user_id: Option<i64>,
    pub subscription_id: Option<i64>,
    pub plan_id: Option<i64>,
    pub status: Option<SubscriptionStatus>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionEventType {
    PlanCreated,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionCancelled,
    SubscriptionExpired,
}

impl SubscriptionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionEventType::PlanCreated => "plan_created",
            SubscriptionEventType::SubscriptionCreated => "subscription_created",
            SubscriptionEventType::SubscriptionUpdated => "subscription_updated",
            SubscriptionEventType::SubscriptionCancelled => "subscription_cancelled",
            SubscriptionEventType::SubscriptionExpired => "subscription_expired",
        }
    }
}

impl SubscriptionEvent {
    pub fn plan(event_type: SubscriptionEventType, plan: &Plan, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            user_id: None,
            subscription_id: None,
            plan_id: Some(plan.id),
            status: None,
            occurred_at,
        }
    }

    pub fn subscription(
        event_type: SubscriptionEventType,
        subscription: &Subscription,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            user_id: Some(subscription.user_id),
            subscription_id: Some(subscription.id),
            plan_id: Some(subscription.plan_id),
            status: Some(subscription.status),
            occurred_at,
        }
    }
}

/// Observability seam for the catalog, lifecycle and expiry sweep.
pub trait SubscriptionEventSink: Send + Sync {
    fn emit(&self, event: SubscriptionEvent);
}

/// Default sink: one structured `tracing` record per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl SubscriptionEventSink for TracingEventSink {
    fn emit(&self, event: SubscriptionEvent) {
        tracing::info!(
            event = event.event_type.as_str(),
            event_id = %event.id,
            user_id = event.user_id,
            subscription_id = event.subscription_id,
            plan_id = event.plan_id,
            status = event.status.map(|status| status.as_str()),
            occurred_at = %event.occurred_at,
            "subscription event"
        );
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SubscriptionEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SubscriptionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn event_types(&self) -> Vec<SubscriptionEventType> {
        self.events()
            .into_iter()
            .map(|event| event.event_type)
            .collect()
    }
}

impl SubscriptionEventSink for RecordingEventSink {
    fn emit(&self, event: SubscriptionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
