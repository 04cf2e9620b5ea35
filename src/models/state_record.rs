//! # State Record
//!
//! One observed health sample of a monitored entity.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::utils::serde::deserialize_null_as_default;

/// A single health sample published on `kafka_state`
///
/// Omitted or `null` fields decode to their zero value; only a payload that is
/// not a JSON object of this shape is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Stable identity of the monitored entity
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub id: i64,
    /// Human-readable label, informational only
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub name: String,
    /// The sole input to the analysis decision
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub is_healthy: bool,
    /// Free-text diagnostic, propagated verbatim when unhealthy
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub message: String,
}

impl StateRecord {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        is_healthy: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            is_healthy,
            message: message.into(),
        }
    }

    /// Encode as the UTF-8 JSON payload carried on the stream
    pub fn to_payload(&self) -> PipelineResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| PipelineError::encode("StateRecord", e.to_string()))
    }

    /// Decode a stream payload, failing with a decode error when malformed
    pub fn from_payload(payload: &[u8]) -> PipelineResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| PipelineError::decode("StateRecord", e.to_string()))
    }
}
