//! Account service providing a typed API over the command handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::AggregateId;
use event_store::{EventEnvelope, EventStore};

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    Account, AccountCommand, AccountDecider, CommandPreparer, CreateAccount, CredentialCheck,
    DeleteAccount, DisableAccount, EnableAccount, LoginAccount, PasswordHasher, PasswordHashing,
    SendCreatedConfirmation, SendDisabledConfirmation, SendEnabledConfirmation, UpdateAccount,
};

/// Service for managing accounts.
///
/// Wraps the command handler and an [`AccountDecider`] whose chain starts
/// with password hashing and credential verification.
pub struct AccountService<S: EventStore> {
    handler: CommandHandler<S, Account>,
    decider: AccountDecider,
}

impl<S: EventStore> AccountService<S> {
    /// Creates a service that hashes and verifies passwords with `hasher`.
    pub fn new(store: S, hasher: Arc<dyn PasswordHasher>) -> Self {
        let decider = AccountDecider::new()
            .with_preparer(PasswordHashing::new(hasher.clone()))
            .with_preparer(CredentialCheck::new(hasher));

        Self {
            handler: CommandHandler::new(store),
            decider,
        }
    }

    /// Bounds every store call made on behalf of a command.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.handler = self.handler.with_timeout(timeout);
        self
    }

    /// Appends a preparer after the built-in ones.
    pub fn with_preparer(mut self, preparer: impl CommandPreparer + 'static) -> Self {
        self.decider = self.decider.with_preparer(preparer);
        self
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Account> {
        &self.handler
    }

    pub fn decider(&self) -> &AccountDecider {
        &self.decider
    }

    /// Executes any account command.
    ///
    /// Conflicts are returned to the caller, who decides whether to retry.
    #[tracing::instrument(
        skip(self, command),
        fields(command_type = command.command_type(), account_id = %command.aggregate_id())
    )]
    pub async fn execute(
        &self,
        command: AccountCommand,
    ) -> Result<CommandResult<Account>, DomainError> {
        let command_type = command.command_type();
        let account_id = command.aggregate_id();
        let started = Instant::now();
        metrics::counter!("account_commands_total", "command" => command_type).increment(1);

        let decider = self.decider.clone();
        let result = self
            .handler
            .execute_with_snapshot(account_id, move |account| {
                decider.decide(account, command)
            })
            .await;

        metrics::histogram!("account_command_duration_seconds", "command" => command_type)
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    version = %outcome.new_version,
                    state = %outcome.aggregate.state(),
                    "command executed"
                );
            }
            Err(error) => {
                metrics::counter!(
                    "account_command_failures_total",
                    "command" => command_type,
                    "reason" => error.kind()
                )
                .increment(1);
                tracing::warn!(%error, retryable = error.is_retryable(), "command failed");
            }
        }

        result
    }

    pub async fn create(&self, cmd: CreateAccount) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    pub async fn update(&self, cmd: UpdateAccount) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    pub async fn delete(&self, cmd: DeleteAccount) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    pub async fn enable(&self, cmd: EnableAccount) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    pub async fn disable(
        &self,
        cmd: DisableAccount,
    ) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    /// Verifies credentials and records the login.
    pub async fn login(&self, cmd: LoginAccount) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    pub async fn send_enabled_confirmation(
        &self,
        cmd: SendEnabledConfirmation,
    ) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    pub async fn send_disabled_confirmation(
        &self,
        cmd: SendDisabledConfirmation,
    ) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    pub async fn send_created_confirmation(
        &self,
        cmd: SendCreatedConfirmation,
    ) -> Result<CommandResult<Account>, DomainError> {
        self.execute(cmd.into()).await
    }

    /// Loads an account by ID from the event log.
    ///
    /// Returns None if the account was never created. A deleted account is
    /// returned as its tombstone.
    #[tracing::instrument(skip(self))]
    pub async fn get_account(
        &self,
        account_id: AggregateId,
    ) -> Result<Option<Account>, DomainError> {
        self.handler.load_existing(account_id).await
    }

    /// Returns the committed events of an account in version order.
    #[tracing::instrument(skip(self))]
    pub async fn events(
        &self,
        account_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let events = self.handler.history(account_id).await?;
        if events.is_empty() {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: Account::aggregate_type(),
                aggregate_id: account_id.to_string(),
            });
        }
        Ok(events)
    }
}
