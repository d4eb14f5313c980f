//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is the tag written to the envelope and must match the serde tag
    /// of the payload.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates in an event-sourced system.
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events
/// - Generate events from commands
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    ///
    /// Returns None for a new, uninitialized aggregate.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the version of the last applied event.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    ///
    /// Called by the command handler after loading events.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// Given the same state and event this must always produce the same new
    /// state. An event the current state cannot accept means the stream is
    /// corrupt or the schema drifted, so it is reported instead of skipped.
    fn apply(&mut self, event: Self::Event) -> Result<(), Self::Error>;

    /// Applies multiple events in sequence, stopping at the first failure.
    fn apply_events(
        &mut self,
        events: impl IntoIterator<Item = Self::Event>,
    ) -> Result<(), Self::Error> {
        for event in events {
            self.apply(event)?;
        }
        Ok(())
    }
}

/// Trait for aggregates that support snapshotting.
///
/// Snapshotting is an optimization to avoid replaying all events when loading
/// an aggregate. The aggregate state is periodically serialized and stored.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Returns the snapshot interval (number of events between snapshots).
    fn snapshot_interval() -> usize {
        100
    }

    /// Returns whether a snapshot should be taken given the current version.
    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Opened,
        Set { value: i32 },
        Closed,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Opened => "TestOpened",
                TestEvent::Set { .. } => "TestSet",
                TestEvent::Closed => "TestClosed",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct TestAggregate {
        id: Option<AggregateId>,
        value: i32,
        closed: bool,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("closed")]
    struct Closed;

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = Closed;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
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

        fn apply(&mut self, event: Self::Event) -> Result<(), Closed> {
            if self.closed {
                return Err(Closed);
            }
            match event {
                TestEvent::Opened => self.id = Some(AggregateId::new()),
                TestEvent::Set { value } => self.value = value,
                TestEvent::Closed => self.closed = true,
            }
            Ok(())
        }
    }

    impl SnapshotCapable for TestAggregate {}

    #[test]
    fn apply_events_folds_in_order() {
        let mut aggregate = TestAggregate::default();
        aggregate
            .apply_events(vec![
                TestEvent::Opened,
                TestEvent::Set { value: 1 },
                TestEvent::Set { value: 42 },
            ])
            .unwrap();

        assert!(aggregate.id().is_some());
        assert_eq!(aggregate.value, 42);
    }

    #[test]
    fn apply_events_stops_at_first_rejection() {
        let mut aggregate = TestAggregate::default();
        let result = aggregate.apply_events(vec![
            TestEvent::Opened,
            TestEvent::Closed,
            TestEvent::Set { value: 7 },
        ]);

        assert!(result.is_err());
        assert_eq!(aggregate.value, 0);
    }

    #[test]
    fn domain_event_type() {
        assert_eq!(TestEvent::Opened.event_type(), "TestOpened");
        assert_eq!(TestEvent::Set { value: 42 }.event_type(), "TestSet");
    }

    #[test]
    fn snapshot_interval() {
        let mut aggregate = TestAggregate::default();
        assert!(!aggregate.should_snapshot());

        aggregate.set_version(Version::new(100));
        assert!(aggregate.should_snapshot());

        aggregate.set_version(Version::new(101));
        assert!(!aggregate.should_snapshot());
    }
}
