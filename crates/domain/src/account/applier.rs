//! Per-state event appliers.
//!
//! Each lifecycle state has one applier that knows which events it can
//! fold. Anything else means the stream and the schema disagree, and is
//! reported as [`AccountError::UnsupportedEvent`].

use chrono::{DateTime, Utc};

use crate::aggregate::DomainEvent;

use super::{Account, AccountError, AccountEvent, LifecycleState};

/// Folds one event into an account that is in a particular state.
pub trait StateApplier: Send + Sync {
    fn state(&self) -> LifecycleState;

    fn apply(&self, account: &mut Account, event: AccountEvent) -> Result<(), AccountError>;
}

struct InitialApplier;
struct EnabledApplier;
struct DisabledApplier;
struct DeletedApplier;

/// Returns the applier responsible for `state`.
pub fn applier_for(state: LifecycleState) -> &'static dyn StateApplier {
    match state {
        LifecycleState::Initial => &InitialApplier,
        LifecycleState::Enabled => &EnabledApplier,
        LifecycleState::Disabled => &DisabledApplier,
        LifecycleState::Deleted => &DeletedApplier,
    }
}

fn unsupported(state: LifecycleState, event: &AccountEvent) -> AccountError {
    AccountError::UnsupportedEvent {
        state,
        event_type: event.event_type(),
    }
}

impl StateApplier for InitialApplier {
    fn state(&self) -> LifecycleState {
        LifecycleState::Initial
    }

    fn apply(&self, account: &mut Account, event: AccountEvent) -> Result<(), AccountError> {
        match event {
            AccountEvent::AccountCreated(data) => {
                account.id = Some(data.account_id);
                account.name = data.name;
                account.username = data.username;
                account.password = data.password;
                account.email = data.email;
                account.roles = data.roles;
                account.disabled = data.disabled;
                account.state = if data.disabled {
                    LifecycleState::Disabled
                } else {
                    LifecycleState::Enabled
                };
                Ok(())
            }
            other => Err(unsupported(self.state(), &other)),
        }
    }
}

impl StateApplier for EnabledApplier {
    fn state(&self) -> LifecycleState {
        LifecycleState::Enabled
    }

    fn apply(&self, account: &mut Account, event: AccountEvent) -> Result<(), AccountError> {
        check_owner(account, &event)?;
        match event {
            AccountEvent::AccountDisabled(_) => {
                account.disabled = true;
                account.state = LifecycleState::Disabled;
                Ok(())
            }
            AccountEvent::AccountDeleted(data) => {
                tombstone(account, data.deleted_at);
                Ok(())
            }
            other => apply_active(self.state(), account, other),
        }
    }
}

impl StateApplier for DisabledApplier {
    fn state(&self) -> LifecycleState {
        LifecycleState::Disabled
    }

    fn apply(&self, account: &mut Account, event: AccountEvent) -> Result<(), AccountError> {
        check_owner(account, &event)?;
        match event {
            AccountEvent::AccountEnabled(_) => {
                account.disabled = false;
                account.state = LifecycleState::Enabled;
                Ok(())
            }
            other => apply_active(self.state(), account, other),
        }
    }
}

impl StateApplier for DeletedApplier {
    fn state(&self) -> LifecycleState {
        LifecycleState::Deleted
    }

    fn apply(&self, _account: &mut Account, event: AccountEvent) -> Result<(), AccountError> {
        Err(unsupported(self.state(), &event))
    }
}

/// Events shared by both active states.
fn apply_active(
    state: LifecycleState,
    account: &mut Account,
    event: AccountEvent,
) -> Result<(), AccountError> {
    match event {
        AccountEvent::AccountUpdated(data) => {
            account.name = data.name;
            account.username = data.username;
            account.password = data.password;
            account.email = data.email;
            account.roles = data.roles;
            Ok(())
        }
        event if event.is_audit_only() => Ok(()),
        other => Err(unsupported(state, &other)),
    }
}

/// Clears everything but the identity and records the deletion time.
fn tombstone(account: &mut Account, deleted_at: DateTime<Utc>) {
    *account = Account {
        id: account.id,
        version: account.version,
        deleted_at: Some(deleted_at),
        state: LifecycleState::Deleted,
        ..Account::default()
    };
}

fn check_owner(account: &Account, event: &AccountEvent) -> Result<(), AccountError> {
    match account.id {
        Some(account_id) if account_id != event.account_id() => {
            Err(AccountError::IdentityMismatch {
                command_id: event.account_id(),
                account_id,
            })
        }
        _ => Ok(()),
    }
}
