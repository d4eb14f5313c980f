//! Command handling infrastructure.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version};

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate from the event store (snapshot plus tail)
/// 2. Executing the command to produce events
/// 3. Persisting the events with the last-known version as expectation
/// 4. Applying the persisted events to the in-memory aggregate
///
/// A stale expectation comes back as a conflict; the handler never retries.
/// Every store call is bounded by the optional timeout.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    timeout: Option<Duration>,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: None,
            _phantom: PhantomData,
        }
    }

    /// Bounds every store call made by this handler.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs a store call under the configured timeout.
    ///
    /// A call that times out is dropped before it completes, so an atomic
    /// append either lands entirely or not at all.
    async fn call<T, F>(&self, call: F) -> Result<T, DomainError>
    where
        F: Future<Output = event_store::Result<T>>,
    {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => Ok(result?),
                Err(_) => {
                    tracing::warn!(
                        aggregate_type = A::aggregate_type(),
                        ?limit,
                        "store call timed out"
                    );
                    Err(DomainError::Timeout(limit))
                }
            },
            None => Ok(call.await?),
        }
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        DomainError: From<A::Error>,
    {
        let (snapshot, events) = self.call(self.store.load_aggregate(aggregate_id)).await?;

        let mut aggregate = if let Some(snapshot) = snapshot {
            self.restore_from_snapshot(snapshot)?
        } else {
            A::default()
        };

        // Apply events after snapshot
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event)?;
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Returns the committed envelopes of one aggregate in version order.
    pub async fn history(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        self.call(self.store.get_events_for_aggregate(aggregate_id)).await
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error. It runs on the blocking
    /// pool because deciding may hash passwords.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de> + 'static,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error> + Send + 'static,
        DomainError: From<A::Error>,
    {
        let loaded = self.load(aggregate_id).await?;
        let current_version = loaded.version();

        let (mut aggregate, decided) = tokio::task::spawn_blocking(move || {
            let decided = command_fn(&loaded);
            (loaded, decided)
        })
        .await?;
        let events = decided?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(aggregate_id, current_version, &events)?;

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        let new_version = self.call(self.store.append(envelopes, options)).await?;

        for event in &events {
            aggregate.apply(event.clone())?;
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }

    fn restore_from_snapshot(&self, snapshot: Snapshot) -> Result<A, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
    {
        let version = snapshot.version;
        let mut aggregate: A = snapshot.into_state()?;
        aggregate.set_version(version);
        Ok(aggregate)
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Executes a command and saves a snapshot when the interval is reached.
    ///
    /// The events are already committed when the snapshot is written, so a
    /// failed snapshot is logged and the command still succeeds.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A: 'static,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error> + Send + 'static,
        DomainError: From<A::Error>,
    {
        let result = self.execute(aggregate_id, command_fn).await?;

        if !result.events.is_empty() && result.aggregate.should_snapshot() {
            let snapshot = Snapshot::from_state(
                aggregate_id,
                A::aggregate_type(),
                result.new_version,
                &result.aggregate,
            )?;
            if let Err(error) = self.call(self.store.save_snapshot(snapshot)).await {
                tracing::warn!(%aggregate_id, %error, "failed to save snapshot");
            }
        }

        Ok(result)
    }
}
