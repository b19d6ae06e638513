use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// key: subscription-models -> plans,subscriptions,patches
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub features: String,
    pub duration_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied plan definition, validated by the catalog before storage.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub features: String,
    pub duration_days: i32,
}

/// Fully stamped plan row handed to the store; the store only assigns the id.
#[derive(Debug, Clone)]
pub struct NewPlanRecord {
    pub name: String,
    pub price: f64,
    pub features: String,
    pub duration_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Inactive => "INACTIVE",
            SubscriptionStatus::Cancelled => "CANCELLED",
            SubscriptionStatus::Expired => "EXPIRED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            "CANCELLED" => Some(Self::Cancelled),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        SubscriptionStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// True when the subscription is still marked active but its end date has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.end_date.map(|end| end < now).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscriptionRecord {
    pub user_id: i64,
    pub plan_id: i64,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A subscription together with the plan it currently points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionRecord {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub plan: Plan,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub user_id: i64,
    pub plan_id: i64,
}

/// Presence-aware field for partial updates.
///
/// An omitted key deserializes to `Absent` (via `#[serde(default)]`), an explicit
/// JSON `null` to `Null`, anything else to `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Absent
    }
}

impl<T> FieldUpdate<T> {
    pub fn is_present(&self) -> bool {
        !matches!(self, FieldUpdate::Absent)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FieldUpdate::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<'de, T> Deserialize<'de> for FieldUpdate<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => FieldUpdate::Value(value),
            None => FieldUpdate::Null,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionPatch {
    #[serde(default)]
    pub plan_id: FieldUpdate<i64>,
    #[serde(default)]
    pub status: FieldUpdate<SubscriptionStatus>,
}

impl SubscriptionPatch {
    pub fn plan(plan_id: i64) -> Self {
        Self {
            plan_id: FieldUpdate::Value(plan_id),
            ..Self::default()
        }
    }

    pub fn status(status: SubscriptionStatus) -> Self {
        Self {
            status: FieldUpdate::Value(status),
            ..Self::default()
        }
    }
}
