//! Event store collaborators for the account event-sourcing system.
//!
//! - [`EventStore`]: ordered per-aggregate streams with optimistic concurrency
//! - [`EventBus`]: at-least-once delivery of committed envelopes to subscribers
//! - [`InMemoryEventStore`] / [`InMemoryEventBus`]: in-process implementations

pub mod bus;
pub mod error;
pub mod event;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use bus::{Delivery, EventBus, EventSubscription, InMemoryEventBus};
pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
