//! Account lifecycle state and the classifier that derives it from history.

use serde::{Deserialize, Serialize};

use super::AccountEvent;

/// The lifecycle state of an account.
///
/// State transitions:
/// ```text
///            Created{disabled=false}
/// Initial ─────────────────────────────► Enabled ──┐
///    │                                   ▲   │     │
///    │ Created{disabled=true}    Enabled │   │ Disabled
///    │                                   │   ▼     │
///    └─────────────────────────────────► Disabled  │
///                                            │     │ Deleted
///                                    Deleted ▼     ▼
///                                          Deleted (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LifecycleState {
    /// No events yet; only creation is possible.
    #[default]
    Initial,

    /// Active and allowed to log in.
    Enabled,

    /// Active but locked out of login.
    Disabled,

    /// Soft-deleted (terminal state).
    Deleted,
}

impl LifecycleState {
    /// Returns true for the two states that accept updates and deletion.
    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleState::Enabled | LifecycleState::Disabled)
    }

    /// Returns true if no command can ever succeed again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Deleted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Initial => "Initial",
            LifecycleState::Enabled => "Enabled",
            LifecycleState::Disabled => "Disabled",
            LifecycleState::Deleted => "Deleted",
        }
    }

    /// Returns the state reached once `event` is recorded.
    ///
    /// This only follows transitions; whether the event is legal here is the
    /// applier's concern.
    pub fn after(self, event: &AccountEvent) -> Self {
        if self.is_terminal() {
            return self;
        }
        match event {
            AccountEvent::AccountCreated(data) if data.disabled => LifecycleState::Disabled,
            AccountEvent::AccountCreated(_) => LifecycleState::Enabled,
            AccountEvent::AccountEnabled(_) => LifecycleState::Enabled,
            AccountEvent::AccountDisabled(_) => LifecycleState::Disabled,
            AccountEvent::AccountDeleted(_) => LifecycleState::Deleted,
            _ => self,
        }
    }

    /// Classifies an event history. An empty history is `Initial`.
    pub fn classify<'a>(events: impl IntoIterator<Item = &'a AccountEvent>) -> Self {
        events
            .into_iter()
            .fold(LifecycleState::Initial, |state, event| state.after(event))
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
