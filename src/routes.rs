use axum::{routing::get, Extension, Router};

use crate::subscriptions::{api, SubscriptionLifecycle};

pub async fn root() -> &'static str {
    "Subscription Service"
}

pub async fn health() -> &'static str {
    "ok"
}

pub fn api_routes() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(api::routes())
}

/// Full application router with the lifecycle (and its catalog) attached.
pub fn app(lifecycle: SubscriptionLifecycle) -> Router {
    api_routes().layer(Extension(lifecycle))
}
