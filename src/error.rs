//! Error types for the cache engines and the HTTP front-end
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Boxed codec error carried by the marshal/unmarshal variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Error type shared by every [`Cache`](crate::cache::Cache) engine.
///
/// Consumers branch on the variants, never on engine internals:
///
/// ```
/// # use kvcache::error::CacheError;
/// let err = CacheError::NotFound;
/// assert!(matches!(err, CacheError::NotFound));
/// ```
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is absent or has expired
    #[error("cache: key not found")]
    NotFound,

    /// A mutating operation was attempted after `close`
    #[error("cache: closed")]
    Closed,

    /// Value could not be encoded
    #[error("cache: marshal failed: {0}")]
    Marshal(#[source] BoxError),

    /// Stored bytes could not be decoded
    #[error("cache: unmarshal failed: {0}")]
    Unmarshal(#[source] BoxError),

    /// Error reported by the remote backend, passed through as-is
    #[error(transparent)]
    Backend(#[from] redis::RedisError),
}

impl CacheError {
    /// Returns true for the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

// == API Error Enum ==
/// Errors surfaced by the HTTP front-end.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Error returned by the cache engine
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation not offered by the configured backend
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Cache(CacheError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Cache(CacheError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unsupported(_) => StatusCode::NOT_FOUND,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        assert!(CacheError::NotFound.is_not_found());
        assert!(!CacheError::Closed.is_not_found());
    }

    #[test]
    fn test_marshal_error_keeps_source() {
        let codec = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = CacheError::Unmarshal(Box::new(codec));

        assert!(err.to_string().starts_with("cache: unmarshal failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::Cache(CacheError::NotFound), StatusCode::NOT_FOUND),
            (ApiError::Cache(CacheError::Closed), StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unsupported("stats".into()), StatusCode::NOT_FOUND),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
