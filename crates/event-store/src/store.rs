use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the caller last observed for the aggregate.
    /// If None, no version check is performed.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the aggregate to be at exactly `version`.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the aggregate to have no events yet.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

/// A stream of committed events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Durable, ordered storage of aggregate event streams.
///
/// Implementations must make `append` atomic: either every envelope in
/// the batch is committed or none is, so a cancelled or failed call
/// leaves the store unmodified.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events for a single aggregate.
    ///
    /// Fails with `ConcurrencyConflict` when `options.expected_version` is
    /// set and differs from the stream's current version. Returns the
    /// version of the aggregate after the append.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Returns every event of an aggregate in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Returns the events of an aggregate with `version >= from_version`.
    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Streams all committed events with `sequence > after`, in commit order.
    ///
    /// `stream_events_after(0)` replays the whole store.
    async fn stream_events_after(&self, after: u64) -> Result<EventStream>;

    /// Gets the current version of an aggregate, or None if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Saves a snapshot, replacing any previous one for the aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Convenience methods available on every event store.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Checks if an aggregate has any events.
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads an aggregate's snapshot, if any, plus the events after it.
    async fn load_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        if let Some(snapshot) = self.get_snapshot(aggregate_id).await? {
            let events = self
                .get_events_for_aggregate_from_version(aggregate_id, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.get_events_for_aggregate(aggregate_id).await?;
            Ok((None, events))
        }
    }

    /// Streams the whole store from the beginning.
    async fn stream_all_events(&self) -> Result<EventStream> {
        self.stream_events_after(0).await
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks that a batch is non-empty, targets one aggregate and carries
/// consecutive versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all events must belong to the same aggregate".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {expected_version}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Account")
            .event_type("AccountUpdated")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_events_for_append(&[]),
            Err(EventStoreError::InvalidAppend(_))
        ));
    }

    #[test]
    fn mixed_aggregates_are_rejected() {
        let events = vec![envelope(AggregateId::new(), 1), envelope(AggregateId::new(), 2)];
        assert!(validate_events_for_append(&events).is_err());
    }

    #[test]
    fn version_gaps_are_rejected() {
        let id = AggregateId::new();
        let events = vec![envelope(id, 1), envelope(id, 3)];
        let err = validate_events_for_append(&events).unwrap_err();
        assert!(err.to_string().contains("expected 2, got 3"));
    }

    #[test]
    fn consecutive_batch_is_accepted() {
        let id = AggregateId::new();
        let events = vec![envelope(id, 4), envelope(id, 5), envelope(id, 6)];
        assert!(validate_events_for_append(&events).is_ok());
    }
}
