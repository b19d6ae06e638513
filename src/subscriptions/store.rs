use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use super::models::{
    NewPlanRecord, NewSubscriptionRecord, Plan, Subscription, SubscriptionStatus,
};

/// Persistence capability behind the catalog and lifecycle.
///
/// Callers stamp every timestamp before handing a record over; implementations only
/// assign ids (ascending, in insertion order) and write what they are given.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert_plan(&self, plan: &NewPlanRecord) -> sqlx::Result<Plan>;
    async fn find_plan(&self, plan_id: i64) -> sqlx::Result<Option<Plan>>;
    async fn list_plans(&self, skip: i64, limit: i64) -> sqlx::Result<Vec<Plan>>;
    async fn insert_subscription(
        &self,
        subscription: &NewSubscriptionRecord,
    ) -> sqlx::Result<Subscription>;
    /// First `ACTIVE` subscription for the user by ascending id.
    async fn find_active_subscription(&self, user_id: i64) -> sqlx::Result<Option<Subscription>>;
    async fn update_subscription(&self, subscription: &Subscription) -> sqlx::Result<Subscription>;
    /// `ACTIVE` subscriptions whose end date is strictly before `now`.
    async fn list_overdue_active(&self, now: DateTime<Utc>) -> sqlx::Result<Vec<Subscription>>;
    /// Marks the row `EXPIRED` only if it is still `ACTIVE` and past its end date at `now`.
    /// `Ok(None)` when the row no longer qualifies.
    async fn expire_if_overdue(
        &self,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Option<Subscription>>;
}

/// key: subscription-store -> postgres
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan_id, status, start_date, end_date, created_at, updated_at";

fn subscription_from_row(row: &PgRow) -> sqlx::Result<Subscription> {
    let raw_status: String = row.try_get("status")?;
    let status = SubscriptionStatus::from_str(&raw_status).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown subscription status '{raw_status}'").into())
    })?;

    Ok(Subscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        plan_id: row.try_get("plan_id")?,
        status,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn insert_plan(&self, plan: &NewPlanRecord) -> sqlx::Result<Plan> {
        sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (name, price, features, duration_days, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&plan.name)
        .bind(plan.price)
        .bind(&plan.features)
        .bind(plan.duration_days)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_plan(&self, plan_id: i64) -> sqlx::Result<Option<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_plans(&self, skip: i64, limit: i64) -> sqlx::Result<Vec<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans ORDER BY id ASC OFFSET $1 LIMIT $2")
            .bind(skip)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    async fn insert_subscription(
        &self,
        subscription: &NewSubscriptionRecord,
    ) -> sqlx::Result<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions (
                user_id,
                plan_id,
                status,
                start_date,
                end_date,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(subscription.user_id)
        .bind(subscription.plan_id)
        .bind(subscription.status.as_str())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .fetch_one(&self.pool)
        .await?;

        subscription_from_row(&row)
    }

    async fn find_active_subscription(&self, user_id: i64) -> sqlx::Result<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND status = $2 ORDER BY id ASC LIMIT 1"
        ))
        .bind(user_id)
        .bind(SubscriptionStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn update_subscription(&self, subscription: &Subscription) -> sqlx::Result<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET plan_id = $2,
                status = $3,
                start_date = $4,
                end_date = $5,
                updated_at = $6
            WHERE id = $1
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(subscription.id)
        .bind(subscription.plan_id)
        .bind(subscription.status.as_str())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.updated_at)
        .fetch_one(&self.pool)
        .await?;

        subscription_from_row(&row)
    }

    async fn list_overdue_active(&self, now: DateTime<Utc>) -> sqlx::Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE status = $1 AND end_date IS NOT NULL AND end_date < $2 ORDER BY id ASC"
        ))
        .bind(SubscriptionStatus::Active.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    async fn expire_if_overdue(
        &self,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Option<Subscription>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET status = $2,
                updated_at = $3
            WHERE id = $1
              AND status = $4
              AND end_date IS NOT NULL
              AND end_date < $3
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(subscription_id)
        .bind(SubscriptionStatus::Expired.as_str())
        .bind(now)
        .bind(SubscriptionStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }
}
