//! Error types for the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error type for API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be understood.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The server is shutting down and does not start new runs.
    #[error("shutting down")]
    ShuttingDown,

    /// A background task failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(msg) => {
                tracing::debug!("bad request: {}", msg);
                StatusCode::BAD_REQUEST
            }
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(err) => {
                tracing::error!(
                    error = &**err as &dyn std::error::Error,
                    "error handling request"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
