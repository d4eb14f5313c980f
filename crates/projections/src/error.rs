//! Projection error types.

use common::AggregateId;
use event_store::Version;
use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload (unknown type or schema drift).
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The shared applier refused the event.
    #[error("Account error: {0}")]
    Account(#[from] domain::AccountError),

    /// An event arrived before its predecessor for the same aggregate.
    #[error("Out-of-order event for {aggregate_id}: expected version {expected}, got {actual}")]
    OutOfOrder {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),

    /// A failure that may clear up on a later attempt, such as a timed-out
    /// store call. The projection's checkpoint stays where it was.
    #[error("Transient projection error: {0}")]
    Transient(String),
}

impl ProjectionError {
    /// Returns true if replaying the same event later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProjectionError::EventStore(e) => e.is_conflict(),
            ProjectionError::Transient(_) => true,
            _ => false,
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
