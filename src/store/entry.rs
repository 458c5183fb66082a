//! Stored Entry Module
//!
//! Defines the structure of entries held by the in-process store.

use std::time::{SystemTime, UNIX_EPOCH};

// == Stored Entry ==
/// A single encoded value with its expiry.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// The encoded value
    pub value: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates a new entry with optional TTL in seconds.
    pub fn new(value: Vec<u8>, ttl_seconds: Option<u64>) -> Self {
        let mut entry = Self {
            value,
            expires_at: None,
        };
        entry.expire_in(ttl_seconds);
        entry
    }

    /// Resets the expiry to `ttl_seconds` from now, or clears it.
    pub fn expire_in(&mut self, ttl_seconds: Option<u64>) {
        self.expires_at =
            ttl_seconds.map(|ttl| current_timestamp_ms().saturating_add(ttl.saturating_mul(1000)));
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Remaining TTL in whole seconds, rounded up, or None without expiry.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let remaining_ms = expires.saturating_sub(current_timestamp_ms());
            remaining_ms.div_ceil(1000)
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
