//! # Analysis Verdict
//!
//! The classified outcome of one [`StateRecord`](super::StateRecord).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, PipelineResult};
use crate::utils::serde::deserialize_null_as_default;

/// Verdict status, serialized as `"ok"` or `"issue"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Ok,
    Issue,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Issue => "issue",
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdict published on `analyzed_state` and forwarded to the sink
///
/// `id` and `message` decode to their zero value when omitted or `null`. The
/// status has no zero value and must be `"ok"` or `"issue"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    /// Copied from the source state record
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub id: i64,
    pub status: VerdictStatus,
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub message: String,
}

impl AnalysisVerdict {
    pub fn new(id: i64, status: VerdictStatus, message: impl Into<String>) -> Self {
        Self {
            id,
            status,
            message: message.into(),
        }
    }

    pub fn is_issue(&self) -> bool {
        self.status == VerdictStatus::Issue
    }

    /// Encode as the UTF-8 JSON payload carried on the stream
    pub fn to_payload(&self) -> PipelineResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| PipelineError::encode("AnalysisVerdict", e.to_string()))
    }

    /// Decode a stream payload, failing with a decode error when malformed
    pub fn from_payload(payload: &[u8]) -> PipelineResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| PipelineError::decode("AnalysisVerdict", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(VerdictStatus::Ok).unwrap(), json!("ok"));
        assert_eq!(
            serde_json::to_value(VerdictStatus::Issue).unwrap(),
            json!("issue")
        );
        assert_eq!(VerdictStatus::Issue.to_string(), "issue");
    }

    #[test]
    fn test_wire_shape() {
        let verdict = AnalysisVerdict::new(1, VerdictStatus::Ok, "ok no changes needed");
        assert_eq!(
            serde_json::to_value(&verdict).unwrap(),
            json!({"id": 1, "status": "ok", "message": "ok no changes needed"})
        );
    }

    #[test]
    fn test_unknown_status_is_decode_error() {
        let err = AnalysisVerdict::from_payload(br#"{"id": 1, "status": "maybe", "message": ""}"#)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_missing_or_null_message_is_empty() {
        let verdict = AnalysisVerdict::from_payload(br#"{"id":1,"status":"ok"}"#).unwrap();
        assert_eq!(verdict, AnalysisVerdict::new(1, VerdictStatus::Ok, ""));

        let verdict =
            AnalysisVerdict::from_payload(br#"{"id":null,"status":"issue","message":null}"#)
                .unwrap();
        assert_eq!(verdict, AnalysisVerdict::new(0, VerdictStatus::Issue, ""));
    }

    #[test]
    fn test_missing_status_is_decode_error() {
        let err = AnalysisVerdict::from_payload(br#"{"id":1,"message":"m"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_payload_round_trip() {
        let verdict = AnalysisVerdict::new(
            30,
            VerdictStatus::Issue,
            "configuration issue need to change following configuration JJJ",
        );
        let decoded = AnalysisVerdict::from_payload(&verdict.to_payload().unwrap()).unwrap();
        assert_eq!(decoded, verdict);
        assert!(decoded.is_issue());
    }
}
