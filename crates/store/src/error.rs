//! Store error types.

use thiserror::Error;

/// Errors that can occur in the shared-state stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist (or its TTL has expired).
    #[error("Key not found: {key}")]
    MissingKey { key: String },

    /// An entry with this key already exists.
    #[error("Duplicate key: {key}")]
    Duplicate { key: String },
}

impl StoreError {
    /// Missing-key error for the given key.
    pub fn missing(key: impl Into<String>) -> Self {
        StoreError::MissingKey { key: key.into() }
    }

    /// Duplicate-key error for the given key.
    pub fn duplicate(key: impl Into<String>) -> Self {
        StoreError::Duplicate { key: key.into() }
    }
}
