//! Key Validation Module
//!
//! Keys are routed by the store using hash tags and pattern syntax, so the
//! characters carrying that meaning are rejected up front.

use crate::error::{CacheError, Result};

/// Characters a key may not contain.
pub const RESERVED_KEY_CHARACTERS: &[char] = &['{', '}', '(', ')', '/', '\\', '@', ':'];

// == Validate Key ==
/// Fails with `CacheError::InvalidKey` when the key is empty or contains
/// a reserved character.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(RESERVED_KEY_CHARACTERS) {
        return Err(CacheError::invalid_key());
    }
    Ok(())
}

// == Validate Keys ==
/// Validates a key batch, failing on an empty batch or on the first bad key.
pub fn validate_keys<K: AsRef<str>>(keys: &[K]) -> Result<()> {
    if keys.is_empty() {
        return Err(CacheError::invalid_keys());
    }
    keys.iter().try_for_each(|key| validate_key(key.as_ref()))
}
