//! Projection processor for feeding events to projections.

use event_store::{Delivery, EventEnvelope, EventStore, EventSubscription};
use futures_util::StreamExt;
use tokio::sync::watch;

use crate::Result;
use crate::projection::Projection;

/// Processes events from an event store and delivers them to projections.
///
/// The processor supports:
/// - Catch-up: replays events after the lowest checkpoint from the store
/// - Live delivery: follows a bus subscription, falling back to catch-up
///   when the subscription lags or skips a sequence
/// - Rebuild: resets all projections and replays from scratch
///
/// Every projection is only handed events newer than its own checkpoint, so
/// replays and duplicate deliveries are no-ops.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Returns the lowest checkpoint across all projections.
    pub async fn checkpoint(&self) -> u64 {
        let mut lowest: Option<u64> = None;
        for projection in &self.projections {
            let sequence = projection.position().await.last_sequence;
            lowest = Some(lowest.map_or(sequence, |current| current.min(sequence)));
        }
        lowest.unwrap_or(0)
    }

    /// Runs catch-up processing: streams the events after the lowest
    /// checkpoint and delivers each to the projections that haven't seen it.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let from = self.checkpoint().await;
        let mut stream = self.store.stream_events_after(from).await?;
        let mut replayed: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            self.process_event(&event).await?;
            replayed += 1;
        }

        tracing::info!(from, events_replayed = replayed, "catch-up complete");

        Ok(())
    }

    /// Delivers a single committed event to every projection behind it.
    #[tracing::instrument(
        skip(self, event),
        fields(event_type = %event.event_type, sequence = event.sequence)
    )]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            let pos = projection.position().await;
            if !pos.is_behind(event.sequence) {
                continue;
            }
            projection.handle(event).await.inspect_err(|error| {
                if error.is_retryable() {
                    tracing::warn!(projection = projection.name(), %error, "projection deferred");
                } else {
                    tracing::error!(projection = projection.name(), %error, "projection failed");
                }
            })?;
            metrics::counter!("projections_events_processed", "projection" => projection.name())
                .increment(1);
        }
        Ok(())
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }

    /// Follows `subscription` until the bus closes or `shutdown` fires.
    ///
    /// Open the subscription before the initial catch-up so nothing committed
    /// in between is missed; envelopes the catch-up already covered are
    /// skipped by the checkpoints.
    ///
    /// A retryable failure leaves the checkpoints where they were and the
    /// next delivery catches up from them. Any other failure ends the loop.
    #[tracing::instrument(skip_all)]
    pub async fn run(
        &self,
        mut subscription: EventSubscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            let delivery = tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("projection processor stopping");
                    return Ok(());
                }
                delivery = subscription.next() => delivery,
            };

            let step = match delivery {
                Delivery::Event(event) => {
                    if event.sequence > self.checkpoint().await + 1 {
                        tracing::debug!(
                            sequence = event.sequence,
                            "gap in live stream, catching up"
                        );
                        self.run_catch_up().await
                    } else {
                        self.process_event(&event).await
                    }
                }
                Delivery::Lagged(missed) => {
                    tracing::warn!(missed, "subscription lagged, catching up from store");
                    self.run_catch_up().await
                }
                Delivery::Closed => {
                    tracing::info!("event bus closed");
                    return Ok(());
                }
            };

            if let Err(error) = step {
                if !error.is_retryable() {
                    return Err(error);
                }
                metrics::counter!("projections_deferred_total").increment(1);
                let checkpoint = self.checkpoint().await;
                tracing::warn!(
                    %error,
                    checkpoint,
                    "retrying from checkpoint on next delivery"
                );
            }
        }
    }
}
