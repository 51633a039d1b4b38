//! Error types for the cache
//!
//! Provides unified error handling using thiserror. A cache miss is never an
//! error: read operations return `Option::None` for an absent key and only the
//! variants below are ever raised.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every cache backend and facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key required to be present was absent (`pop` without default, `item`)
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// `popitem` on a region holding no live entries
    #[error("Cache region is empty: {0}")]
    EmptyCache(String),

    /// A memoization argument has no stable value representation
    #[error("Unhashable argument: {0}")]
    UnhashableArgument(String),

    /// Connection to the remote service was lost mid-operation
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Remote operation exceeded its configured deadline
    #[error("Backend timed out after {0:?}")]
    BackendTimeout(Duration),

    /// Value could not be encoded or decoded by the remote protocol
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// Explicit region name was rejected
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for failures raised by the remote transport.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            CacheError::NetworkFailure(_)
                | CacheError::BackendTimeout(_)
                | CacheError::SerializationFailure(_)
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::KeyNotFound(_) | CacheError::EmptyCache(_) => StatusCode::NOT_FOUND,
            CacheError::UnhashableArgument(_)
            | CacheError::InvalidRegion(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NetworkFailure(_) | CacheError::SerializationFailure(_) => {
                StatusCode::BAD_GATEWAY
            }
            CacheError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Config(_) | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_failure_classification() {
        assert!(CacheError::NetworkFailure("reset".into()).is_backend_failure());
        assert!(CacheError::BackendTimeout(Duration::from_millis(5)).is_backend_failure());
        assert!(CacheError::SerializationFailure("bad".into()).is_backend_failure());
        assert!(!CacheError::KeyNotFound("k".into()).is_backend_failure());
        assert!(!CacheError::EmptyCache("DEFAULT".into()).is_backend_failure());
    }

    #[test]
    fn test_status_mapping() {
        let response = CacheError::KeyNotFound("k".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = CacheError::BackendTimeout(Duration::from_secs(1)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = CacheError::InvalidRegion(String::new()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
