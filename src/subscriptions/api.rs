use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

use super::{
    CreateSubscriptionRequest, NewPlan, Plan, SubscriptionLifecycle, SubscriptionPatch,
    SubscriptionRecord,
};

const DEFAULT_PLAN_PAGE_LIMIT: i64 = 100;

/// key: subscription-api -> rest endpoints
pub fn routes() -> Router {
    Router::new()
        .route("/api/v1/plans", get(list_plans).post(create_plan))
        .route("/api/v1/plans/:plan_id", get(get_plan))
        .route("/api/v1/subscriptions", post(create_subscription))
        .route(
            "/api/v1/subscriptions/:user_id",
            get(get_user_subscription)
                .put(update_subscription)
                .delete(cancel_subscription),
        )
}

#[derive(Debug, Deserialize)]
pub struct PlanPage {
    #[serde(default)]
    pub skip: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn create_plan(
    Extension(lifecycle): Extension<SubscriptionLifecycle>,
    Json(payload): Json<NewPlan>,
) -> AppResult<Json<Plan>> {
    let plan = lifecycle.catalog().create_plan(payload).await?;
    Ok(Json(plan))
}

pub async fn list_plans(
    Extension(lifecycle): Extension<SubscriptionLifecycle>,
    Query(page): Query<PlanPage>,
) -> AppResult<Json<Vec<Plan>>> {
    let plans = lifecycle
        .catalog()
        .list_plans(
            page.skip.unwrap_or(0),
            page.limit.unwrap_or(DEFAULT_PLAN_PAGE_LIMIT),
        )
        .await?;
    Ok(Json(plans))
}

pub async fn get_plan(
    Extension(lifecycle): Extension<SubscriptionLifecycle>,
    Path(plan_id): Path<i64>,
) -> AppResult<Json<Plan>> {
    lifecycle
        .catalog()
        .get_plan(plan_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("plan {plan_id} not found")))
}

pub async fn create_subscription(
    Extension(lifecycle): Extension<SubscriptionLifecycle>,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> AppResult<Json<SubscriptionRecord>> {
    let record = lifecycle
        .create_subscription(payload.user_id, payload.plan_id)
        .await?;
    Ok(Json(record))
}

pub async fn get_user_subscription(
    Extension(lifecycle): Extension<SubscriptionLifecycle>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<SubscriptionRecord>> {
    lifecycle
        .get_active_subscription(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Subscription not found".into()))
}

pub async fn update_subscription(
    Extension(lifecycle): Extension<SubscriptionLifecycle>,
    Path(user_id): Path<i64>,
    Json(patch): Json<SubscriptionPatch>,
) -> AppResult<Json<SubscriptionRecord>> {
    let record = lifecycle.update_subscription(user_id, patch).await?;
    Ok(Json(record))
}

pub async fn cancel_subscription(
    Extension(lifecycle): Extension<SubscriptionLifecycle>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<SubscriptionRecord>> {
    let record = lifecycle.cancel_subscription(user_id).await?;
    Ok(Json(record))
}
