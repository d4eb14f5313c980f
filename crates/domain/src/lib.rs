//! Domain layer for the account event-sourcing system.
//!
//! This crate provides:
//! - [`Aggregate`] and [`DomainEvent`] traits for event-sourced entities
//! - [`CommandHandler`], the controller that loads, decides, appends and applies
//! - The [`Account`] lifecycle state machine with per-state executors and appliers
//! - Password hashing at the preparer seam ([`PasswordHasher`])

pub mod account;
pub mod aggregate;
pub mod command;
pub mod error;

pub use account::{
    Account, AccountCommand, AccountCreatedData, AccountDecider, AccountDeletedData,
    AccountDisabledData, AccountEnabledData, AccountError, AccountEvent, AccountLoggedData,
    AccountService, AccountUpdatedData, Argon2PasswordHasher, CommandPreparer,
    ConfirmationSentData, CreateAccount, CredentialCheck, DeleteAccount, DisableAccount,
    EnableAccount, LifecycleState, LoginAccount, PasswordHasher, PasswordHashing, PersonName,
    SendCreatedConfirmation, SendDisabledConfirmation, SendEnabledConfirmation, StateApplier,
    StateExecutor, UpdateAccount, applier_for, executor_for,
};
pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use command::{CommandHandler, CommandResult};
pub use error::DomainError;
