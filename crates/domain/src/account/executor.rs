//! Per-state command executors.
//!
//! An executor owns the whitelist of one lifecycle state and turns an
//! accepted command into exactly one event. Executors are pure: the
//! emission time is passed in.

use chrono::{DateTime, Utc};

use super::{
    Account, AccountCommand, AccountCreatedData, AccountDeletedData, AccountDisabledData,
    AccountEnabledData, AccountError, AccountEvent, AccountLoggedData, AccountUpdatedData,
    ConfirmationSentData, LifecycleState,
};

/// Validates and executes commands for one lifecycle state.
pub trait StateExecutor: Send + Sync {
    fn state(&self) -> LifecycleState;

    /// Returns true if `command` is on this state's whitelist.
    fn accepts(&self, command: &AccountCommand) -> bool;

    /// Rejects commands that are not legal in this state.
    fn check(&self, command: &AccountCommand) -> Result<(), AccountError> {
        if self.accepts(command) {
            Ok(())
        } else {
            Err(AccountError::UnsupportedCommand {
                state: self.state(),
                command: command.command_type(),
            })
        }
    }

    /// Checks `command` and emits the event it produces.
    fn execute(
        &self,
        command: AccountCommand,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        self.check(&command)?;
        Ok(vec![emit(command, account, now)])
    }
}

struct InitialExecutor;
struct EnabledExecutor;
struct DisabledExecutor;
struct DeletedExecutor;

/// Returns the executor responsible for `state`.
pub fn executor_for(state: LifecycleState) -> &'static dyn StateExecutor {
    match state {
        LifecycleState::Initial => &InitialExecutor,
        LifecycleState::Enabled => &EnabledExecutor,
        LifecycleState::Disabled => &DisabledExecutor,
        LifecycleState::Deleted => &DeletedExecutor,
    }
}

impl StateExecutor for InitialExecutor {
    fn state(&self) -> LifecycleState {
        LifecycleState::Initial
    }

    fn accepts(&self, command: &AccountCommand) -> bool {
        matches!(command, AccountCommand::Create(_))
    }
}

impl StateExecutor for EnabledExecutor {
    fn state(&self) -> LifecycleState {
        LifecycleState::Enabled
    }

    fn accepts(&self, command: &AccountCommand) -> bool {
        matches!(
            command,
            AccountCommand::Disable(_)
                | AccountCommand::Delete(_)
                | AccountCommand::SendEnabledConfirmation(_)
                | AccountCommand::Update(_)
                | AccountCommand::Login(_)
        )
    }
}

impl StateExecutor for DisabledExecutor {
    fn state(&self) -> LifecycleState {
        LifecycleState::Disabled
    }

    fn accepts(&self, command: &AccountCommand) -> bool {
        matches!(
            command,
            AccountCommand::Enable(_)
                | AccountCommand::SendDisabledConfirmation(_)
                | AccountCommand::Update(_)
        )
    }
}

impl StateExecutor for DeletedExecutor {
    fn state(&self) -> LifecycleState {
        LifecycleState::Deleted
    }

    fn accepts(&self, _command: &AccountCommand) -> bool {
        false
    }

    fn check(&self, command: &AccountCommand) -> Result<(), AccountError> {
        Err(AccountError::Deleted(command.aggregate_id()))
    }
}

/// Maps an accepted command to its event.
fn emit(command: AccountCommand, account: &Account, now: DateTime<Utc>) -> AccountEvent {
    match command {
        AccountCommand::Create(c) => AccountEvent::AccountCreated(AccountCreatedData {
            account_id: c.account_id,
            name: c.name,
            username: c.username,
            password: c.password,
            email: c.email,
            roles: c.roles,
            disabled: c.disabled,
            created_at: now,
        }),
        AccountCommand::Update(c) => AccountEvent::AccountUpdated(AccountUpdatedData {
            account_id: c.account_id,
            name: c.name,
            username: c.username,
            password: c.password.unwrap_or_else(|| account.password.clone()),
            email: c.email,
            roles: c.roles,
            updated_at: now,
        }),
        AccountCommand::Delete(c) => AccountEvent::AccountDeleted(AccountDeletedData {
            account_id: c.account_id,
            deleted_at: now,
        }),
        AccountCommand::Enable(c) => AccountEvent::AccountEnabled(AccountEnabledData {
            account_id: c.account_id,
            enabled_at: now,
        }),
        AccountCommand::Disable(c) => AccountEvent::AccountDisabled(AccountDisabledData {
            account_id: c.account_id,
            disabled_at: now,
        }),
        AccountCommand::Login(c) => AccountEvent::AccountLogged(AccountLoggedData {
            account_id: c.account_id,
            username: c.username,
            email: c.email,
            logged_at: now,
        }),
        AccountCommand::SendEnabledConfirmation(c) => {
            AccountEvent::AccountSentEnabledConfirmation(ConfirmationSentData {
                account_id: c.account_id,
                sent_at: now,
            })
        }
        AccountCommand::SendDisabledConfirmation(c) => {
            AccountEvent::AccountSentDisabledConfirmation(ConfirmationSentData {
                account_id: c.account_id,
                sent_at: now,
            })
        }
        AccountCommand::SendCreatedConfirmation(c) => {
            AccountEvent::AccountSentCreatedConfirmation(ConfirmationSentData {
                account_id: c.account_id,
                sent_at: now,
            })
        }
    }
}
