use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use axum_prometheus::PrometheusMetricLayer;
use sqlx::postgres::PgPoolOptions;
use subscription_engine::{
    config::{self, StorageBackend},
    subscriptions::{
        ExpirySweeper, InMemorySubscriptionStore, LifecycleConfig, PgSubscriptionStore,
        PlanCatalog, SubscriptionEventSink, SubscriptionLifecycle, SubscriptionStore,
        SystemClock, TracingEventSink,
    },
};
use tokio::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();

    let store: Arc<dyn SubscriptionStore> = match *config::STORAGE_BACKEND {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(*config::DATABASE_MAX_CONNECTIONS)
                .connect(config::DATABASE_URL.as_str())
                .await?;

            if let Err(error) = sqlx::migrate!().run(&pool).await {
                if *config::ALLOW_MIGRATION_FAILURE {
                    tracing::warn!(
                        ?error,
                        "Database migrations failed but continuing due to ALLOW_MIGRATION_FAILURE"
                    );
                } else {
                    return Err(Box::new(error) as Box<dyn std::error::Error>);
                }
            }
            Arc::new(PgSubscriptionStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            Arc::new(InMemorySubscriptionStore::new())
        }
    };
    tracing::info!(backend = config::STORAGE_BACKEND.as_str(), "storage ready");

    let events: Arc<dyn SubscriptionEventSink> = Arc::new(TracingEventSink);
    let catalog = PlanCatalog::new(store.clone(), events.clone(), Arc::new(SystemClock));
    let lifecycle = SubscriptionLifecycle::new(
        catalog,
        LifecycleConfig {
            enforce_single_active: *config::SUBSCRIPTIONS_ENFORCE_SINGLE_ACTIVE,
        },
    );

    if let Some(interval_secs) = *config::EXPIRY_SWEEP_INTERVAL_SECS {
        tracing::info!(interval_secs, "starting subscription expiry sweep");
        ExpirySweeper::new(store.clone(), events.clone())
            .spawn(Duration::from_secs(interval_secs));
    }

    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let app = Router::new()
        .route(
            "/metrics",
            get(move || async move { metrics_handle.render() }),
        )
        .merge(subscription_engine::app(lifecycle))
        .layer(prometheus_layer);

    let addr: SocketAddr = format!("{}:{}", config::BIND_ADDRESS.as_str(), *config::BIND_PORT)
        .parse()
        .map_err(|error| Box::new(error) as Box<dyn std::error::Error>)?;
    tracing::info!(%addr, "Listening for incoming connections");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
