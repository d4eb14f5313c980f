use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{AggregateId, Version};

/// Serialized aggregate state at a known version.
///
/// A snapshot only shortens replay: loading it and folding the events
/// after `version` must give the same state as folding the whole stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Version of the last event folded into `state`.
    pub version: Version,

    pub timestamp: DateTime<Utc>,
    pub state: serde_json::Value,
}

impl Snapshot {
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state,
        }
    }

    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            aggregate_id,
            aggregate_type,
            version,
            serde_json::to_value(state)?,
        ))
    }

    /// Deserializes the snapshot state into a concrete type.
    pub fn into_state<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}
