//! Composition of built-in validation, registered preparers and emission.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{
    Account, AccountCommand, AccountError, AccountEvent, CommandPreparer, StateExecutor,
    executor_for,
};

/// Decides which events a command produces against a folded account.
///
/// The pipeline is fixed when the decider is built:
/// 1. reject commands on a soft-deleted account
/// 2. Create needs an account without identity; every other command must
///    target the loaded identity
/// 3. the state executor's whitelist
/// 4. registered preparers, in registration order
/// 5. emission by the state executor
#[derive(Clone, Default)]
pub struct AccountDecider {
    preparers: Vec<Arc<dyn CommandPreparer>>,
}

impl AccountDecider {
    /// Creates a decider with no preparers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a preparer to the end of the chain.
    pub fn with_preparer(mut self, preparer: impl CommandPreparer + 'static) -> Self {
        self.preparers.push(Arc::new(preparer));
        self
    }

    /// Names of the registered preparers, in the order they run.
    pub fn preparer_names(&self) -> Vec<&'static str> {
        self.preparers.iter().map(|p| p.name()).collect()
    }

    pub fn decide(
        &self,
        account: &Account,
        command: AccountCommand,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        self.decide_at(account, command, Utc::now())
    }

    /// Same as [`decide`](Self::decide) with an explicit emission time.
    pub fn decide_at(
        &self,
        account: &Account,
        mut command: AccountCommand,
        now: DateTime<Utc>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        ensure_not_deleted(account, &command)?;
        ensure_identity(account, &command)?;

        let executor = executor_for(account.state());
        executor.check(&command)?;

        for preparer in &self.preparers {
            preparer.prepare(&mut command, account).inspect_err(|error| {
                tracing::debug!(preparer = preparer.name(), %error, "command rejected by preparer");
            })?;
        }

        executor.execute(command, account, now)
    }
}

fn ensure_not_deleted(account: &Account, command: &AccountCommand) -> Result<(), AccountError> {
    if account.is_deleted() {
        return Err(AccountError::Deleted(
            account.id.unwrap_or_else(|| command.aggregate_id()),
        ));
    }
    Ok(())
}

fn ensure_identity(account: &Account, command: &AccountCommand) -> Result<(), AccountError> {
    match (command, account.id) {
        (AccountCommand::Create(_), Some(_)) => Err(AccountError::AlreadyCreated),
        (AccountCommand::Create(_), None) => Ok(()),
        (command, Some(account_id)) if command.aggregate_id() != account_id => {
            Err(AccountError::IdentityMismatch {
                command_id: command.aggregate_id(),
                account_id,
            })
        }
        // No identity yet: the Initial whitelist rejects the command.
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use common::AggregateId;

    use super::*;
    use crate::account::{
        CreateAccount, DeleteAccount, DisableAccount, EnableAccount, LifecycleState,
        UpdateAccount,
    };
    use crate::aggregate::Aggregate;

    /// Records the order in which preparers ran.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl CommandPreparer for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn prepare(
            &self,
            _command: &mut AccountCommand,
            _account: &Account,
        ) -> Result<(), AccountError> {
            self.log.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    fn created_account(id: AggregateId) -> Account {
        let decider = AccountDecider::new();
        let mut account = Account::default();
        let events = decider
            .decide(
                &account,
                CreateAccount::new(id, "alice", "alice@example.com", "hash").into(),
            )
            .unwrap();
        account.apply_events(events).unwrap();
        account
    }

    #[test]
    fn preparers_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let decider = AccountDecider::new()
            .with_preparer(Recorder {
                name: "first",
                log: log.clone(),
            })
            .with_preparer(Recorder {
                name: "second",
                log: log.clone(),
            });

        let id = AggregateId::new();
        let account = created_account(id);
        decider
            .decide(&account, DisableAccount::new(id).into())
            .unwrap();

        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
        assert_eq!(decider.preparer_names(), ["first", "second"]);
    }

    #[test]
    fn preparers_never_see_illegal_commands() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let decider = AccountDecider::new().with_preparer(Recorder {
            name: "only",
            log: log.clone(),
        });

        let id = AggregateId::new();
        let account = created_account(id);
        let err = decider
            .decide(&account, EnableAccount::new(id).into())
            .unwrap_err();

        assert!(matches!(
            err,
            AccountError::UnsupportedCommand {
                state: LifecycleState::Enabled,
                command: "EnableAccount",
            }
        ));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let id = AggregateId::new();
        let account = created_account(id);

        let err = AccountDecider::new()
            .decide(
                &account,
                CreateAccount::new(id, "alice", "alice@example.com", "hash").into(),
            )
            .unwrap_err();
        assert!(matches!(err, AccountError::AlreadyCreated));
    }

    #[test]
    fn mismatched_identity_is_rejected() {
        let account = created_account(AggregateId::new());

        let err = AccountDecider::new()
            .decide(&account, DisableAccount::new(AggregateId::new()).into())
            .unwrap_err();
        assert!(matches!(err, AccountError::IdentityMismatch { .. }));
    }

    #[test]
    fn commands_before_create_are_unsupported() {
        let err = AccountDecider::new()
            .decide(
                &Account::default(),
                DeleteAccount::new(AggregateId::new()).into(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AccountError::UnsupportedCommand {
                state: LifecycleState::Initial,
                ..
            }
        ));
    }

    #[test]
    fn deleted_account_rejects_everything_as_terminal() {
        let id = AggregateId::new();
        let decider = AccountDecider::new();
        let mut account = created_account(id);
        let events = decider
            .decide(&account, DeleteAccount::new(id).into())
            .unwrap();
        account.apply_events(events).unwrap();

        for command in [
            AccountCommand::from(UpdateAccount::new(id, "alice", "alice@example.com")),
            EnableAccount::new(id).into(),
            CreateAccount::new(id, "alice", "alice@example.com", "hash").into(),
        ] {
            let err = decider.decide(&account, command).unwrap_err();
            assert!(err.is_terminal());
        }
    }

    #[test]
    fn emission_uses_given_time() {
        let id = AggregateId::new();
        let account = created_account(id);
        let now = Utc::now();

        let events = AccountDecider::new()
            .decide_at(&account, DisableAccount::new(id).into(), now)
            .unwrap();
        assert_eq!(events[0].occurred_at(), now);
    }
}
