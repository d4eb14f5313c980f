//! Confirmation error types.

use domain::DomainError;
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

/// Errors that can occur while issuing confirmations.
#[derive(Debug, Error)]
pub enum ConfirmationError {
    /// The confirmation command failed for a reason other than a rejection.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Event store error while reading the account history.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Failed to decode an event from the account history.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl From<ConfirmationError> for ProjectionError {
    fn from(error: ConfirmationError) -> Self {
        match error {
            ConfirmationError::EventStore(e) => ProjectionError::EventStore(e),
            ConfirmationError::Deserialization(e) => ProjectionError::Deserialization(e),
            ConfirmationError::Domain(e) if e.is_retryable() => {
                ProjectionError::Transient(e.to_string())
            }
            ConfirmationError::Domain(e) => ProjectionError::Projection(e.to_string()),
        }
    }
}

/// Convenience type alias for confirmation results.
pub type Result<T> = std::result::Result<T, ConfirmationError>;
