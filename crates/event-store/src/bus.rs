//! Delivery of committed events to asynchronous subscribers.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::EventEnvelope;

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of committed envelopes to subscribers.
///
/// Delivery is at-least-once from the subscriber's point of view: a
/// subscriber that falls behind is told how many envelopes it missed and
/// is expected to catch up from the store, which may replay envelopes it
/// has already seen.
pub trait EventBus: Send + Sync {
    /// Publishes envelopes in commit order.
    fn publish(&self, events: &[EventEnvelope]);

    /// Opens a new subscription that sees envelopes published from now on.
    fn subscribe(&self) -> EventSubscription;
}

/// What a subscriber receives from [`EventSubscription::next`].
#[derive(Debug)]
pub enum Delivery {
    Event(EventEnvelope),
    /// The subscriber fell behind and `n` envelopes were dropped for it.
    Lagged(u64),
    /// Every publisher is gone.
    Closed,
}

/// Receiving half of an [`EventBus`] subscription.
pub struct EventSubscription {
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl EventSubscription {
    /// Waits for the next delivery. Cancel-safe.
    pub async fn next(&mut self) -> Delivery {
        match self.receiver.recv().await {
            Ok(event) => Delivery::Event(event),
            Err(RecvError::Lagged(n)) => Delivery::Lagged(n),
            Err(RecvError::Closed) => Delivery::Closed,
        }
    }
}

/// In-process bus backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct InMemoryEventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus that buffers up to `capacity` envelopes per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, events: &[EventEnvelope]) {
        for event in events {
            // No subscribers is not an error: consumers catch up from the store.
            if self.sender.send(event.clone()).is_err() {
                tracing::trace!(event_type = %event.event_type, "no subscribers for event");
            }
        }
    }

    fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AggregateId, Version};

    fn envelope(sequence: u64) -> EventEnvelope {
        let mut envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Account")
            .event_type("AccountEnabled")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap();
        envelope.sequence = sequence;
        envelope
    }

    #[tokio::test]
    async fn subscribers_receive_in_publish_order() {
        let bus = InMemoryEventBus::new();
        let mut subscription = bus.subscribe();

        bus.publish(&[envelope(1), envelope(2)]);

        for expected in [1, 2] {
            match subscription.next().await {
                Delivery::Event(event) => assert_eq!(event.sequence, expected),
                other => panic!("unexpected delivery: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_fine() {
        let bus = InMemoryEventBus::new();
        bus.publish(&[envelope(1)]);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_is_told_it_lagged() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut subscription = bus.subscribe();

        bus.publish(&[envelope(1), envelope(2), envelope(3)]);

        assert!(matches!(subscription.next().await, Delivery::Lagged(1)));
        assert!(matches!(subscription.next().await, Delivery::Event(e) if e.sequence == 2));
    }

    #[tokio::test]
    async fn dropping_every_sender_closes_the_subscription() {
        let bus = InMemoryEventBus::new();
        let mut subscription = bus.subscribe();
        drop(bus);
        assert!(matches!(subscription.next().await, Delivery::Closed));
    }
}
