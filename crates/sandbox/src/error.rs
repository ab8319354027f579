//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use remote::RemoteError;
use remote::wire::ErrorBody;

/// API-level error type that maps to the collaborator's failure bodies.
///
/// Business rejections carry their reason as `{ success: false, error }`.
/// A missing resource is a bare 404, which clients read as "not found"
/// rather than as a rejection.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound,
    /// Request refused by a business rule.
    Rejected(String),
    /// Backing store unreachable.
    Unavailable(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match self {
            ApiError::NotFound => return StatusCode::NOT_FOUND.into_response(),
            ApiError::Rejected(reason) => (StatusCode::BAD_REQUEST, reason),
            ApiError::Unavailable(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason),
            ApiError::Internal(reason) => {
                tracing::error!(error = %reason, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, reason)
            }
        };

        (status, axum::Json(ErrorBody::new(reason))).into_response()
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected(reason) => ApiError::Rejected(reason),
            RemoteError::NotFound => ApiError::NotFound,
            RemoteError::Unavailable(reason) => ApiError::Unavailable(reason),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
