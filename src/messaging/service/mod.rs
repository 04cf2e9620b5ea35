//! # Stream Service
//!
//! Provider-agnostic durable streams.
//!
//! ```text
//! StreamProvider (enum dispatch)
//!   ├── Pgmq      -> PgmqStreamService -> PgmqClient -> pgmq queues + stream catalog
//!   └── InMemory  -> InMemoryStreamService
//! ```
//!
//! Each stream binds a fixed set of subjects. Publishing appends to the stream
//! bound to the subject; fetching hands out messages with an acknowledgement
//! deadline after which unacknowledged messages are delivered again.

pub mod provider;
pub mod providers;
pub mod traits;
pub mod types;

pub use provider::StreamProvider;
pub use providers::{InMemoryStreamService, PgmqStreamService, StreamEnvelope};
pub use traits::StreamService;
pub use types::{
    validate_subject, DeliveredMessage, MessageId, MessageMetadata, PublishAck, ReceiptHandle,
    StreamConfig, StreamCounters, StreamHealthReport, StreamStats,
};
