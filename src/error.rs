//! Error types for the cache facade
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache facade and its gateway.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty, contains a reserved character, or a key batch is empty
    #[error("{0}")]
    InvalidKey(String),

    /// Failure reported by the store client, passed through untouched
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Value could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key not found (gateway reads without a default)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Internal gateway error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Error raised for a single malformed key.
    pub fn invalid_key() -> Self {
        CacheError::InvalidKey("Invalid key value.".to_string())
    }

    /// Error raised for an empty key collection.
    pub fn invalid_keys() -> Self {
        CacheError::InvalidKey("Invalid key values.".to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Store(_) => StatusCode::BAD_GATEWAY,
            CacheError::Codec(_) | CacheError::Config(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache facade.
pub type Result<T> = std::result::Result<T, CacheError>;
