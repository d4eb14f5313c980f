use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError, Result};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-aggregate sequence number used for optimistic concurrency control.
///
/// A stream with no events is at version 0; its first event carries
/// version 1 and every later event increments by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of a stream that has no events yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version carried by the first event of a stream.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A persisted domain event together with its stream metadata.
///
/// `sequence` is the store-wide commit position. It is zero until the
/// store accepts the envelope and is strictly increasing across all
/// aggregates afterwards, which lets consumers checkpoint and resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// Type tag of the payload (e.g. "AccountCreated").
    pub event_type: String,

    pub aggregate_id: AggregateId,

    /// Aggregate kind (e.g. "Account").
    pub aggregate_type: String,

    /// Version of the aggregate after this event.
    pub version: Version,

    /// Global commit position, assigned by the store.
    #[serde(default)]
    pub sequence: u64,

    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Returns true once the store has assigned a commit position.
    pub fn is_committed(&self) -> bool {
        self.sequence > 0
    }

    /// Decodes the payload into a concrete event type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Serializes `payload` into the envelope.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the envelope, failing if a required field is missing.
    pub fn build(self) -> Result<EventEnvelope> {
        let missing = |field: &str| EventStoreError::InvalidAppend(format!("{field} is required"));

        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.ok_or_else(|| missing("event_type"))?,
            aggregate_id: self.aggregate_id.ok_or_else(|| missing("aggregate_id"))?,
            aggregate_type: self.aggregate_type.ok_or_else(|| missing("aggregate_type"))?,
            version: self.version.ok_or_else(|| missing("version"))?,
            sequence: 0,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload.ok_or_else(|| missing("payload"))?,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_sequence() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::initial().next(), Version::first());
        assert!(Version::new(1) < Version::new(2));
    }

    #[test]
    fn builder_fills_defaults() {
        let aggregate_id = AggregateId::new();
        let envelope = EventEnvelope::builder()
            .event_type("AccountCreated")
            .aggregate_id(aggregate_id)
            .aggregate_type("Account")
            .version(Version::first())
            .payload_raw(serde_json::json!({"type": "AccountCreated"}))
            .metadata("source", serde_json::json!("test"))
            .build()
            .unwrap();

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence, 0);
        assert!(!envelope.is_committed());
        assert_eq!(
            envelope.metadata.get("source"),
            Some(&serde_json::json!("test"))
        );
    }

    #[test]
    fn builder_reports_missing_field() {
        let err = EventEnvelope::builder()
            .event_type("AccountCreated")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("aggregate_id is required"));
    }

    #[test]
    fn decode_reads_payload() {
        #[derive(Deserialize)]
        struct Payload {
            name: String,
        }

        let envelope = EventEnvelope::builder()
            .event_type("Named")
            .aggregate_id(AggregateId::new())
            .aggregate_type("Test")
            .version(Version::first())
            .payload_raw(serde_json::json!({"name": "alice"}))
            .build()
            .unwrap();

        let payload: Payload = envelope.decode().unwrap();
        assert_eq!(payload.name, "alice");
    }
}
