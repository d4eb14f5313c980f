//! Account confirmation process manager.
//!
//! Reacts to committed lifecycle transitions by issuing the matching
//! confirmation command back to the account aggregate:
//! - `AccountEnabled` leads to `SendEnabledConfirmation`
//! - `AccountDisabled` leads to `SendDisabledConfirmation`
//!
//! The manager is driven by a [`projections::ProjectionProcessor`] like any
//! other projection, so it shares its checkpointing and catch-up.

pub mod error;
pub mod manager;

pub use error::{ConfirmationError, Result};
pub use manager::{
    CONFLICT_RETRIES, ConfirmationKind, ConfirmationOutcome, ConfirmationProcessManager,
};
