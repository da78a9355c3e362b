//! Error type returned by every handler.
//!
//! Domain outcomes from the store keep their own message; anything that
//! means the store or runtime failed becomes `Internal`, which is logged
//! and reported as a 500 together with the underlying cause.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use murmur_db::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Referenced entity is absent (404)
    #[error("{0}")]
    NotFound(String),

    /// Actor doesn't own the resource (403)
    #[error("{0}")]
    Forbidden(String),

    /// Self-targeting follow/unfollow (400)
    #[error("{0}")]
    InvalidOperation(String),

    /// Duplicate follow, taken username or email (400)
    #[error("{0}")]
    Conflict(String),

    /// Malformed request body or parameter (400)
    #[error("{0}")]
    Validation(String),

    /// Missing or bad credentials (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Store unreachable or rejected the operation (500)
    #[error("{context}: {cause}")]
    Internal { context: &'static str, cause: String },
}

impl ApiError {
    pub fn internal(context: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Internal {
            context,
            cause: cause.to_string(),
        }
    }

    pub fn from_store(context: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::Forbidden(_) => Self::Forbidden(err.to_string()),
            StoreError::InvalidOperation(_) => Self::InvalidOperation(err.to_string()),
            StoreError::Conflict(_) => Self::Conflict(err.to_string()),
            StoreError::Sqlite(_) | StoreError::Poisoned => Self::internal(context, err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidOperation(_) | Self::Conflict(_) | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            Self::Internal { context, cause } => {
                error!("{}: {}", context, cause);
                json!({ "message": context, "error": cause })
            }
            other => json!({ "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_outcomes_keep_their_message() {
        let err = ApiError::from_store("Error following user", StoreError::NotFound("User"));
        assert!(matches!(&err, ApiError::NotFound(m) if m == "User not found"));

        let err = ApiError::from_store("ctx", StoreError::Forbidden("delete this story"));
        assert_eq!(err.to_string(), "Not authorized to delete this story");
    }

    #[test]
    fn store_failure_becomes_internal() {
        let err = ApiError::from_store("Error fetching messages", StoreError::Poisoned);
        match err {
            ApiError::Internal { context, cause } => {
                assert_eq!(context, "Error fetching messages");
                assert_eq!(cause, "database lock poisoned");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_codes() {
        let code = |e: ApiError| e.into_response().status();
        assert_eq!(code(ApiError::Conflict("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(code(ApiError::InvalidOperation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(code(ApiError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(code(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            code(ApiError::internal("ctx", "boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
