//! Accounts read model: the current state of every live account.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Account, AccountEvent, Aggregate};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::{ProjectionError, Result};

/// Read model view of accounts, folded with the write side's applier.
///
/// Each account keeps the version of the last event applied to it; an
/// envelope at or below that version is a redelivery and is skipped. Deleted
/// accounts stay in the map as tombstones but are hidden from queries.
#[derive(Clone, Default)]
pub struct AccountsView {
    accounts: Arc<RwLock<HashMap<AggregateId, Account>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl AccountsView {
    /// Creates a new empty accounts view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds a live account by its username.
    pub async fn find_by_username(&self, username: &str) -> Option<Account> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| !a.is_deleted() && a.username() == username)
            .cloned()
    }

    /// Finds a live account by email, ignoring ASCII case.
    pub async fn find_by_email(&self, email: &str) -> Option<Account> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| !a.is_deleted() && a.email().eq_ignore_ascii_case(email))
            .cloned()
    }

    /// Returns true if at least one live account exists.
    pub async fn exists_any(&self) -> bool {
        self.accounts.read().await.values().any(|a| !a.is_deleted())
    }

    /// Returns the folded state for `id`, tombstones included.
    pub async fn get_including_deleted(&self, id: AggregateId) -> Option<Account> {
        self.accounts.read().await.get(&id).cloned()
    }

    async fn advance(&self, sequence: u64) {
        let mut pos = self.position.write().await;
        *pos = pos.advance_to(sequence);
    }
}

#[async_trait]
impl Projection for AccountsView {
    fn name(&self) -> &'static str {
        "AccountsView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Account::aggregate_type() {
            self.advance(event.sequence).await;
            return Ok(());
        }

        let account_event: AccountEvent = serde_json::from_value(event.payload.clone())?;
        let account_id = event.aggregate_id;

        let mut accounts = self.accounts.write().await;
        let mut account = accounts.get(&account_id).cloned().unwrap_or_default();

        if event.version <= account.version() {
            tracing::debug!(%account_id, version = %event.version, "skipping redelivered event");
        } else if event.version != account.version().next() {
            return Err(ProjectionError::OutOfOrder {
                aggregate_id: account_id,
                expected: account.version().next(),
                actual: event.version,
            });
        } else {
            account.apply(account_event)?;
            account.set_version(event.version);
            accounts.insert(account_id, account);
        }
        drop(accounts);

        self.advance(event.sequence).await;
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.accounts.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl ReadModel for AccountsView {
    type Item = Account;

    fn name(&self) -> &'static str {
        "accounts"
    }

    async fn find_by_id(&self, id: AggregateId) -> Option<Account> {
        self.accounts
            .read()
            .await
            .get(&id)
            .filter(|a| !a.is_deleted())
            .cloned()
    }

    async fn find_all(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| !a.is_deleted())
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.username().cmp(b.username()));
        accounts
    }

    async fn count(&self) -> usize {
        self.accounts
            .read()
            .await
            .values()
            .filter(|a| !a.is_deleted())
            .count()
    }
}
