//! Account aggregate root.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};

use super::{
    AccountError, AccountEvent, LifecycleState, PersonName, StateApplier, applier_for,
};

/// Account aggregate root.
///
/// Only the event stream is authoritative; this struct is the fold of it.
/// `state` caches the lifecycle state so executors and appliers can be
/// picked without replaying again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub(super) id: Option<AggregateId>,

    #[serde(default)]
    pub(super) version: Version,

    pub(super) name: Option<PersonName>,
    pub(super) username: String,

    /// Salted password hash.
    pub(super) password: String,

    pub(super) email: String,
    pub(super) roles: BTreeSet<String>,
    pub(super) disabled: bool,
    pub(super) deleted_at: Option<DateTime<Utc>>,
    pub(super) state: LifecycleState,
}

impl Aggregate for Account {
    type Event = AccountEvent;
    type Error = AccountError;

    fn aggregate_type() -> &'static str {
        "Account"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) -> Result<(), AccountError> {
        applier_for(self.state).apply(self, event)
    }
}

impl SnapshotCapable for Account {
    fn snapshot_interval() -> usize {
        50
    }
}

// Query methods
impl Account {
    pub fn name(&self) -> Option<&PersonName> {
        self.name.as_ref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the stored password hash.
    pub fn password_hash(&self) -> &str {
        &self.password
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns the cached lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }
}
