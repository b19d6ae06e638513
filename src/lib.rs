pub mod config;
pub mod error;
pub mod routes;
pub mod subscriptions;

pub use routes::{api_routes, app};
