//! Request DTOs for the gateway API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Ttl;

/// Request body for `PUT /cache/:key`
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The value to store
    pub value: Value,
    /// Seconds, numeric text or an ISO-8601 duration; absent means no expiry
    #[serde(default)]
    pub ttl: Option<Ttl>,
}

/// A key with its value, used by batch bodies in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

/// Request body for `POST /batch/get`
#[derive(Debug, Clone, Deserialize)]
pub struct BatchGetRequest {
    pub keys: Vec<String>,
    /// Value reported for missing keys
    #[serde(default)]
    pub default: Value,
}

/// Request body for `PUT /batch`
#[derive(Debug, Clone, Deserialize)]
pub struct BatchSetRequest {
    pub values: Vec<KeyValue>,
    #[serde(default)]
    pub ttl: Option<Ttl>,
}

/// Request body for `POST /batch/delete`
#[derive(Debug, Clone, Deserialize)]
pub struct BatchDeleteRequest {
    pub keys: Vec<String>,
}
