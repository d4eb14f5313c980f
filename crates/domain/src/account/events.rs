//! Account domain events.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::PersonName;

/// Events that can occur on an account aggregate.
///
/// The serde tag doubles as the envelope's `event_type`, so a stored payload
/// with an unknown tag fails to decode instead of being skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AccountEvent {
    AccountCreated(AccountCreatedData),
    AccountUpdated(AccountUpdatedData),
    AccountDeleted(AccountDeletedData),
    AccountEnabled(AccountEnabledData),
    AccountDisabled(AccountDisabledData),
    AccountLogged(AccountLoggedData),
    AccountSentEnabledConfirmation(ConfirmationSentData),
    AccountSentDisabledConfirmation(ConfirmationSentData),
    AccountSentCreatedConfirmation(ConfirmationSentData),
}

impl AccountEvent {
    /// Returns the account this event belongs to.
    pub fn account_id(&self) -> AggregateId {
        match self {
            AccountEvent::AccountCreated(data) => data.account_id,
            AccountEvent::AccountUpdated(data) => data.account_id,
            AccountEvent::AccountDeleted(data) => data.account_id,
            AccountEvent::AccountEnabled(data) => data.account_id,
            AccountEvent::AccountDisabled(data) => data.account_id,
            AccountEvent::AccountLogged(data) => data.account_id,
            AccountEvent::AccountSentEnabledConfirmation(data)
            | AccountEvent::AccountSentDisabledConfirmation(data)
            | AccountEvent::AccountSentCreatedConfirmation(data) => data.account_id,
        }
    }

    /// Returns when the event was emitted.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::AccountCreated(data) => data.created_at,
            AccountEvent::AccountUpdated(data) => data.updated_at,
            AccountEvent::AccountDeleted(data) => data.deleted_at,
            AccountEvent::AccountEnabled(data) => data.enabled_at,
            AccountEvent::AccountDisabled(data) => data.disabled_at,
            AccountEvent::AccountLogged(data) => data.logged_at,
            AccountEvent::AccountSentEnabledConfirmation(data)
            | AccountEvent::AccountSentDisabledConfirmation(data)
            | AccountEvent::AccountSentCreatedConfirmation(data) => data.sent_at,
        }
    }

    /// Returns true for events that record something without changing the account.
    pub fn is_audit_only(&self) -> bool {
        matches!(
            self,
            AccountEvent::AccountLogged(_)
                | AccountEvent::AccountSentEnabledConfirmation(_)
                | AccountEvent::AccountSentDisabledConfirmation(_)
                | AccountEvent::AccountSentCreatedConfirmation(_)
        )
    }
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountCreated(_) => "AccountCreated",
            AccountEvent::AccountUpdated(_) => "AccountUpdated",
            AccountEvent::AccountDeleted(_) => "AccountDeleted",
            AccountEvent::AccountEnabled(_) => "AccountEnabled",
            AccountEvent::AccountDisabled(_) => "AccountDisabled",
            AccountEvent::AccountLogged(_) => "AccountLogged",
            AccountEvent::AccountSentEnabledConfirmation(_) => "AccountSentEnabledConfirmation",
            AccountEvent::AccountSentDisabledConfirmation(_) => "AccountSentDisabledConfirmation",
            AccountEvent::AccountSentCreatedConfirmation(_) => "AccountSentCreatedConfirmation",
        }
    }
}

/// Data for AccountCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCreatedData {
    pub account_id: AggregateId,
    pub name: Option<PersonName>,
    pub username: String,

    /// Salted hash, never the plaintext.
    pub password: String,

    pub email: String,
    pub roles: BTreeSet<String>,

    /// Whether the account starts out disabled.
    pub disabled: bool,

    pub created_at: DateTime<Utc>,
}

/// Data for AccountUpdated event. Carries the full field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdatedData {
    pub account_id: AggregateId,
    pub name: Option<PersonName>,
    pub username: String,
    pub password: String,
    pub email: String,
    pub roles: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDeletedData {
    pub account_id: AggregateId,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEnabledData {
    pub account_id: AggregateId,
    pub enabled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDisabledData {
    pub account_id: AggregateId,
    pub disabled_at: DateTime<Utc>,
}

/// Data for AccountLogged event. The password used is never recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLoggedData {
    pub account_id: AggregateId,
    pub username: String,
    pub email: String,
    pub logged_at: DateTime<Utc>,
}

/// Data shared by the three confirmation events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationSentData {
    pub account_id: AggregateId,
    pub sent_at: DateTime<Utc>,
}
