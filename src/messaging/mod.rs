//! # Messaging Module
//!
//! Durable streams for the pipeline: the provider-agnostic [`StreamService`],
//! the pgmq client backing the durable provider, and the subscription loop that
//! drives message handlers.

pub mod errors;
pub mod pgmq_client;
pub mod service;
pub mod subscription;

pub use errors::{MessagingError, MessagingErrorCategory, MessagingResult};
pub use pgmq_client::{PgmqClient, QueueMetrics, StreamBinding};
pub use service::{
    validate_subject, DeliveredMessage, InMemoryStreamService, MessageId, MessageMetadata,
    PgmqStreamService, PublishAck, ReceiptHandle, StreamConfig, StreamCounters, StreamEnvelope,
    StreamHealthReport, StreamProvider, StreamService, StreamStats,
};
pub use subscription::{
    MessageHandler, StreamSubscriber, SubscriberConfig, SubscriptionHandle, SubscriptionStats,
    SubscriptionStatsSnapshot,
};
