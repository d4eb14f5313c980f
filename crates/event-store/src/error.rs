use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The expected version did not match the stream's actual version.
    ///
    /// Callers resolve this by reloading the aggregate and retrying the
    /// whole command against the newer state.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns true for errors that a caller may resolve by reloading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
