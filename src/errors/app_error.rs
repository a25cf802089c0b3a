//! HTTP-facing application errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::core::realtime::RealtimeError;
use crate::core::session::NotifyError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dialogue error: {0}")]
    Dialogue(#[from] RealtimeError),

    #[error("Notifier error: {0}")]
    Notifier(#[from] NotifyError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Dialogue(RealtimeError::ConnectionFailed(_))
            | AppError::Dialogue(RealtimeError::Timeout(_)) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Dialogue(_)
            | AppError::Notifier(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
