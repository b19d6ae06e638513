//! Plan catalog and per-user subscription lifecycle.

pub mod api;
pub mod catalog;
pub mod clock;
pub mod events;
pub mod expiry;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod store;

use thiserror::Error;

pub use catalog::PlanCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{
    RecordingEventSink, SubscriptionEvent, SubscriptionEventSink, SubscriptionEventType,
    TracingEventSink,
};
pub use expiry::ExpirySweeper;
pub use lifecycle::{LifecycleConfig, SubscriptionLifecycle};
pub use memory::InMemorySubscriptionStore;
pub use models::{
    CreateSubscriptionRequest, FieldUpdate, NewPlan, Plan, Subscription, SubscriptionPatch,
    SubscriptionRecord, SubscriptionStatus,
};
pub use store::{PgSubscriptionStore, SubscriptionStore};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("plan {0} not found")]
    PlanNotFound(i64),
    #[error("no active subscription for user {0}")]
    SubscriptionNotFound(i64),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("user {0} already has an active subscription")]
    ActiveSubscriptionExists(i64),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;
