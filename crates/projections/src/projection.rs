//! Core projection trait and checkpoint tracking.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// Checkpoint of a projection in the global commit order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Commit sequence of the last event this projection handled.
    pub last_sequence: u64,

    /// Number of events handled since the last reset.
    pub events_processed: u64,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Moves the checkpoint to `sequence`.
    pub fn advance_to(&self, sequence: u64) -> Self {
        Self {
            last_sequence: sequence.max(self.last_sequence),
            events_processed: self.events_processed + 1,
        }
    }

    /// Returns true if the event at `sequence` has not been handled yet.
    pub fn is_behind(&self, sequence: u64) -> bool {
        sequence > self.last_sequence
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.last_sequence)
    }
}

/// A projection that processes events and updates a read model.
///
/// `handle` is only called with committed envelopes, in commit order, and
/// must advance the position to the envelope's sequence even when the
/// projection ignores the event. Handling the same envelope twice must
/// leave the read model unchanged.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
