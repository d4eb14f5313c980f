use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventBus, EventEnvelope, EventStoreError, InMemoryEventBus, Result, Snapshot,
    Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    /// Every committed envelope, in commit order.
    events: Vec<EventEnvelope>,
    /// Current version of each aggregate stream.
    versions: HashMap<AggregateId, Version>,
}

/// In-memory event store.
///
/// Appends take a single write lock, so a batch is committed (and
/// published to the optional bus) atomically and in commit order.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
    bus: Option<InMemoryEventBus>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store that publishes nowhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that publishes every committed batch to `bus`.
    pub fn with_bus(bus: InMemoryEventBus) -> Self {
        Self {
            bus: Some(bus),
            ..Self::default()
        }
    }

    /// Returns the bus this store publishes to, if any.
    pub fn bus(&self) -> Option<&InMemoryEventBus> {
        self.bus.as_ref()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        mut events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<Version> {
        validate_events_for_append(&events)?;
        let aggregate_id = events[0].aggregate_id;

        let mut log = self.log.write().await;
        let current = log
            .versions
            .get(&aggregate_id)
            .copied()
            .unwrap_or_else(Version::initial);

        if let Some(expected) = options.expected_version
            && current != expected
        {
            metrics::counter!("event_store_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Versions are unique per stream even when no expectation was given.
        if events[0].version != current.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: events[0].version,
                actual: current,
            });
        }

        let mut sequence = log.events.len() as u64;
        for event in &mut events {
            sequence += 1;
            event.sequence = sequence;
        }

        let last_version = events[events.len() - 1].version;
        log.versions.insert(aggregate_id, last_version);
        log.events.extend(events.iter().cloned());

        if let Some(bus) = &self.bus {
            bus.publish(&events);
        }

        tracing::debug!(%aggregate_id, version = %last_version, count = events.len(), "events appended");
        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_events_for_aggregate_from_version(aggregate_id, Version::first())
            .await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        // Commit order within one stream is version order.
        Ok(log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version >= from_version)
            .cloned()
            .collect())
    }

    async fn stream_events_after(&self, after: u64) -> Result<EventStream> {
        use futures_util::stream;

        let log = self.log.read().await;
        let start = usize::try_from(after).unwrap_or(usize::MAX);
        let events: Vec<_> = log.events.iter().skip(start).cloned().collect();

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.versions.get(&aggregate_id).copied())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.read().await.get(&aggregate_id).cloned())
    }
}
