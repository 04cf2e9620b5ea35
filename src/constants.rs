//! # Pipeline Constants
//!
//! Stream names and subjects shared by every pipeline process. These literals are
//! part of the wire contract: all producers and subscribers must agree on them, so
//! they are constants rather than configuration.

/// Stream carrying raw state samples
pub const KAFKA_STREAM: &str = "KAFKA_STREAM";

/// Subject bound to [`KAFKA_STREAM`]
pub const KAFKA_STATE_SUBJECT: &str = "kafka_state";

/// Stream carrying analysis verdicts
pub const ANALYZED_STREAM: &str = "ANALYZED_STREAM";

/// Subject bound to [`ANALYZED_STREAM`]
pub const ANALYZED_STATE_SUBJECT: &str = "analyzed_state";

/// Verdict message emitted for every healthy sample
pub const HEALTHY_VERDICT_MESSAGE: &str = "ok no changes needed";

/// Default broker address when nothing else is configured
pub const DEFAULT_BROKER_URL: &str = "postgresql://localhost:5432/statewatch";

/// Default state source endpoint
pub const DEFAULT_STATE_URL: &str = "http://localhost:8080/state";

/// Default verdict sink endpoint
pub const DEFAULT_RESULT_URL: &str = "http://localhost:8080/result";

/// Default producer sampling interval
pub const DEFAULT_PRODUCER_INTERVAL_MS: u64 = 10_000;

/// Maximum length pgmq accepts for a queue name
pub const MAX_SUBJECT_LENGTH: usize = 47;

/// Catalog table recording stream to subject bindings
pub const STREAM_CATALOG_TABLE: &str = "statewatch_streams";

/// Static stream definitions used by the pipeline processes
pub mod streams {
    use super::{ANALYZED_STATE_SUBJECT, ANALYZED_STREAM, KAFKA_STATE_SUBJECT, KAFKA_STREAM};
    use crate::messaging::StreamConfig;

    /// `KAFKA_STREAM` bound to `kafka_state`
    pub fn kafka_stream() -> StreamConfig {
        StreamConfig::new(KAFKA_STREAM, [KAFKA_STATE_SUBJECT])
    }

    /// `ANALYZED_STREAM` bound to `analyzed_state`
    pub fn analyzed_stream() -> StreamConfig {
        StreamConfig::new(ANALYZED_STREAM, [ANALYZED_STATE_SUBJECT])
    }
}
