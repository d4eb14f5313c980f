//! Process manager turning lifecycle transitions into confirmation commands.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    Account, AccountEvent, AccountService, Aggregate, DomainError, SendDisabledConfirmation,
    SendEnabledConfirmation,
};
use event_store::{EventEnvelope, EventStore, Version};
use projections::{Projection, ProjectionPosition};
use tokio::sync::{Mutex, RwLock};

use crate::error::Result;

/// Which confirmation a transition calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    Enabled,
    Disabled,
}

impl ConfirmationKind {
    /// The confirmation owed for `event`, if any.
    pub fn for_event(event: &AccountEvent) -> Option<Self> {
        match event {
            AccountEvent::AccountEnabled(_) => Some(Self::Enabled),
            AccountEvent::AccountDisabled(_) => Some(Self::Disabled),
            _ => None,
        }
    }

    /// Returns true if `event` is the confirmation of this kind.
    fn is_sent_by(&self, event: &AccountEvent) -> bool {
        matches!(
            (self, event),
            (Self::Enabled, AccountEvent::AccountSentEnabledConfirmation(_))
                | (Self::Disabled, AccountEvent::AccountSentDisabledConfirmation(_))
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for ConfirmationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a confirmation the manager tried to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The confirmation event was appended at this version.
    Sent(Version),
    /// The history already holds the confirmation for this transition.
    AlreadySent,
    /// The account no longer accepts the confirmation.
    Rejected,
}

/// Issues `SendEnabledConfirmation` / `SendDisabledConfirmation` after the
/// matching transition is committed.
///
/// Each account keeps the version of the last event the manager looked at,
/// so redelivered envelopes are skipped. Before issuing, the account's later
/// history is checked for the confirmation, which keeps a full rebuild from
/// sending it twice.
///
/// `handle` holds the handled map for its whole duration, so a catch-up pass
/// racing the live loop cannot issue the same confirmation twice.
pub struct ConfirmationProcessManager<S: EventStore> {
    service: Arc<AccountService<S>>,
    handled: Arc<Mutex<HashMap<AggregateId, Version>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl<S: EventStore> Clone for ConfirmationProcessManager<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            handled: Arc::clone(&self.handled),
            position: Arc::clone(&self.position),
        }
    }
}

impl<S: EventStore> ConfirmationProcessManager<S> {
    /// Creates a process manager issuing commands through `service`.
    pub fn new(service: Arc<AccountService<S>>) -> Self {
        Self {
            service,
            handled: Arc::new(Mutex::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Issues the confirmation owed for the transition committed at `after`.
    ///
    /// A concurrency conflict only means another command landed first, so
    /// the history is re-read and the command issued again, up to
    /// [`CONFLICT_RETRIES`] times.
    #[tracing::instrument(skip(self), fields(kind = %kind))]
    pub async fn confirm(
        &self,
        kind: ConfirmationKind,
        account_id: AggregateId,
        after: Version,
    ) -> Result<ConfirmationOutcome> {
        let mut attempt = 0;
        loop {
            if self.already_sent(kind, account_id, after).await? {
                tracing::debug!("confirmation already in history");
                return Ok(ConfirmationOutcome::AlreadySent);
            }

            match self.send(kind, account_id).await {
                Ok(version) => {
                    metrics::counter!("confirmations_sent_total", "kind" => kind.as_str())
                        .increment(1);
                    tracing::info!(%version, "confirmation sent");
                    return Ok(ConfirmationOutcome::Sent(version));
                }
                Err(error) if is_rejection(&error) => {
                    tracing::warn!(%error, "confirmation rejected, not retrying");
                    return Ok(ConfirmationOutcome::Rejected);
                }
                Err(error) if error.is_conflict() && attempt < CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(attempt, "account moved on, retrying confirmation");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn send(
        &self,
        kind: ConfirmationKind,
        account_id: AggregateId,
    ) -> std::result::Result<Version, DomainError> {
        let outcome = match kind {
            ConfirmationKind::Enabled => {
                self.service
                    .send_enabled_confirmation(SendEnabledConfirmation::new(account_id))
                    .await?
            }
            ConfirmationKind::Disabled => {
                self.service
                    .send_disabled_confirmation(SendDisabledConfirmation::new(account_id))
                    .await?
            }
        };
        Ok(outcome.new_version)
    }

    /// Returns the version of the last event handled for `account_id`.
    pub async fn handled_version(&self, account_id: AggregateId) -> Option<Version> {
        self.handled.lock().await.get(&account_id).copied()
    }

    async fn already_sent(
        &self,
        kind: ConfirmationKind,
        account_id: AggregateId,
        after: Version,
    ) -> Result<bool> {
        let handler = self.service.handler();
        let read = handler
            .store()
            .get_events_for_aggregate_from_version(account_id, after.next());
        let later = match handler.timeout() {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| DomainError::Timeout(limit))??,
            None => read.await?,
        };

        for envelope in &later {
            let event: AccountEvent = envelope.decode()?;
            if kind.is_sent_by(&event) {
                return Ok(true);
            }
            if ConfirmationKind::for_event(&event).is_some() {
                // A newer transition supersedes this one.
                break;
            }
        }
        Ok(false)
    }

    async fn advance(&self, sequence: u64) {
        let mut pos = self.position.write().await;
        *pos = pos.advance_to(sequence);
    }
}

/// How often a confirmation is re-issued after losing a version race.
pub const CONFLICT_RETRIES: usize = 3;

/// The account no longer accepts the confirmation.
fn is_rejection(error: &DomainError) -> bool {
    matches!(error, DomainError::Account(e) if e.is_validation() || e.is_terminal())
}

#[async_trait]
impl<S: EventStore + 'static> Projection for ConfirmationProcessManager<S> {
    fn name(&self) -> &'static str {
        "ConfirmationProcessManager"
    }

    async fn handle(&self, event: &EventEnvelope) -> projections::Result<()> {
        if event.aggregate_type != Account::aggregate_type() {
            self.advance(event.sequence).await;
            return Ok(());
        }

        let account_id = event.aggregate_id;
        let mut handled = self.handled.lock().await;
        if handled.get(&account_id).is_some_and(|v| event.version <= *v) {
            tracing::debug!(%account_id, version = %event.version, "skipping redelivered event");
            self.advance(event.sequence).await;
            return Ok(());
        }

        let account_event: AccountEvent = event.decode()?;
        if let Some(kind) = ConfirmationKind::for_event(&account_event) {
            self.confirm(kind, account_id, event.version).await?;
        }

        handled.insert(account_id, event.version);
        drop(handled);
        self.advance(event.sequence).await;
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> projections::Result<()> {
        self.handled.lock().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{AccountEnabledData, AccountUpdatedData, ConfirmationSentData};

    fn enabled(id: AggregateId) -> AccountEvent {
        AccountEvent::AccountEnabled(AccountEnabledData {
            account_id: id,
            enabled_at: Utc::now(),
        })
    }

    fn sent(id: AggregateId) -> ConfirmationSentData {
        ConfirmationSentData {
            account_id: id,
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn only_transitions_call_for_confirmation() {
        let id = AggregateId::new();
        assert_eq!(
            ConfirmationKind::for_event(&enabled(id)),
            Some(ConfirmationKind::Enabled)
        );
        let updated = AccountEvent::AccountUpdated(AccountUpdatedData {
            account_id: id,
            name: None,
            username: "alice".into(),
            password: "hash".into(),
            email: "a@b".into(),
            roles: Default::default(),
            updated_at: Utc::now(),
        });
        assert_eq!(ConfirmationKind::for_event(&updated), None);
        assert_eq!(
            ConfirmationKind::for_event(&AccountEvent::AccountSentEnabledConfirmation(sent(id))),
            None
        );
    }

    #[test]
    fn confirmation_matches_its_own_kind_only() {
        let id = AggregateId::new();
        let enabled_sent = AccountEvent::AccountSentEnabledConfirmation(sent(id));
        let disabled_sent = AccountEvent::AccountSentDisabledConfirmation(sent(id));

        assert!(ConfirmationKind::Enabled.is_sent_by(&enabled_sent));
        assert!(!ConfirmationKind::Enabled.is_sent_by(&disabled_sent));
        assert!(ConfirmationKind::Disabled.is_sent_by(&disabled_sent));
        assert!(!ConfirmationKind::Disabled.is_sent_by(&enabled(id)));
    }
}
