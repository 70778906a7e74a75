//! Error types for the filestore API layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use filestore_service::Error as ServiceError;
use thiserror::Error;

/// Error type for API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Errors from the service layer (tiers, transform, multipart).
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// Errors in the request itself, before it reaches the service.
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Service(err) => match err {
                ServiceError::Validation(msg) => {
                    tracing::debug!("validation error: {msg}");
                    StatusCode::BAD_REQUEST
                }
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
                ServiceError::Transform { .. }
                | ServiceError::Transport(_)
                | ServiceError::MultipartSession(_)
                | ServiceError::Io(_) => {
                    // Unexpected; these mean a tier or the pipeline is unwell.
                    tracing::error!(
                        error = err as &dyn std::error::Error,
                        "service error handling request"
                    );
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(msg) => {
                tracing::debug!("bad request: {msg}");
                StatusCode::BAD_REQUEST
            }
        };

        status.into_response()
    }
}
