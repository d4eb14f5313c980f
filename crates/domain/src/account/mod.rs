//! Account aggregate: the lifecycle state machine and its collaborators.

mod applier;
mod commands;
mod decider;
mod events;
mod executor;
mod model;
mod password;
mod preparer;
mod service;
mod state;
mod value_objects;

pub use applier::{StateApplier, applier_for};
pub use commands::*;
pub use decider::AccountDecider;
pub use events::{
    AccountCreatedData, AccountDeletedData, AccountDisabledData, AccountEnabledData,
    AccountEvent, AccountLoggedData, AccountUpdatedData, ConfirmationSentData,
};
pub use executor::{StateExecutor, executor_for};
pub use model::Account;
pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use preparer::{CommandPreparer, CredentialCheck, PasswordHashing};
pub use service::AccountService;
pub use state::LifecycleState;
pub use value_objects::PersonName;

use common::AggregateId;
use thiserror::Error;

/// Errors raised while deciding or applying account commands and events.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The command is not on the whitelist of the current state.
    #[error("Unsupported command {command} for state {state}")]
    UnsupportedCommand {
        state: LifecycleState,
        command: &'static str,
    },

    /// The account is soft-deleted and accepts nothing further.
    #[error("Account {0} is deleted")]
    Deleted(AggregateId),

    /// A create command reached an account that already has an identity.
    #[error("Account already created")]
    AlreadyCreated,

    /// The command targets a different account than the one loaded.
    #[error("Command targets account {command_id} but the stream belongs to {account_id}")]
    IdentityMismatch {
        command_id: AggregateId,
        account_id: AggregateId,
    },

    /// Login credentials did not match the account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A stored event cannot be applied in the current state.
    #[error("Event {event_type} cannot be applied in state {state}")]
    UnsupportedEvent {
        state: LifecycleState,
        event_type: &'static str,
    },

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl AccountError {
    /// Returns true when the account reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AccountError::Deleted(_))
    }

    /// Returns true for rejections caused by the command itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AccountError::UnsupportedCommand { .. }
                | AccountError::AlreadyCreated
                | AccountError::IdentityMismatch { .. }
                | AccountError::InvalidCredentials
        )
    }
}
