//! Response DTOs for the gateway API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use super::requests::KeyValue;

/// Response body for `GET /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for single-key writes and deletes
#[derive(Debug, Clone, Serialize)]
pub struct WriteResponse {
    /// The key that was written or deleted
    pub key: String,
    /// Whether the store acknowledged the operation
    pub success: bool,
}

impl WriteResponse {
    pub fn new(key: impl Into<String>, success: bool) -> Self {
        Self {
            key: key.into(),
            success,
        }
    }
}

/// Response body for `GET /cache/:key/exists`
#[derive(Debug, Clone, Serialize)]
pub struct ExistsResponse {
    pub key: String,
    pub exists: bool,
}

impl ExistsResponse {
    pub fn new(key: impl Into<String>, exists: bool) -> Self {
        Self {
            key: key.into(),
            exists,
        }
    }
}

/// Response body for clear and batch writes
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub success: bool,
}

impl StatusResponse {
    pub fn new(success: bool) -> Self {
        Self { success }
    }
}

/// Response body for `POST /batch/get`, one entry per requested key
#[derive(Debug, Clone, Serialize)]
pub struct BatchGetResponse {
    pub values: Vec<KeyValue>,
}

impl BatchGetResponse {
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(key, value)| KeyValue { key, value })
                .collect(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
