//! Domain error types.

use std::time::Duration;

use event_store::EventStoreError;
use thiserror::Error;

use crate::account::AccountError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The account rejected the command or could not apply an event.
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// A store call did not finish within the configured limit.
    #[error("Event store call timed out after {0:?}")]
    Timeout(Duration),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking task deciding the command panicked or was cancelled.
    #[error("Command task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DomainError {
    /// Returns true if the caller may reload and try the command again.
    pub fn is_retryable(&self) -> bool {
        match self {
            DomainError::EventStore(e) => e.is_conflict(),
            DomainError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Returns true for optimistic-concurrency conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::EventStore(e) if e.is_conflict() => "conflict",
            DomainError::EventStore(_) => "store",
            DomainError::Account(e) if e.is_terminal() => "terminal",
            DomainError::Account(AccountError::InvalidCredentials) => "credentials",
            DomainError::Account(AccountError::UnsupportedEvent { .. }) => "corrupt",
            DomainError::Account(AccountError::Hashing(_)) => "hashing",
            DomainError::Account(_) => "validation",
            DomainError::Timeout(_) => "timeout",
            DomainError::AggregateNotFound { .. } => "not_found",
            DomainError::Serialization(_) => "serialization",
            DomainError::Task(_) => "task",
        }
    }
}
