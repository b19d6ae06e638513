use axum::{http::StatusCode, response::{IntoResponse, Response}};
use thiserror::Error;

use crate::subscriptions::SubscriptionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<SubscriptionError> for AppError {
    fn from(error: SubscriptionError) -> Self {
        match error {
            SubscriptionError::PlanNotFound(_) | SubscriptionError::SubscriptionNotFound(_) => {
                AppError::NotFound(error.to_string())
            }
            SubscriptionError::Validation(message) => AppError::BadRequest(message),
            SubscriptionError::ActiveSubscriptionExists(_) => AppError::Conflict(error.to_string()),
            SubscriptionError::Store(source) => AppError::Db(source),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(?self);
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
