//! # Stream Service Traits
//!
//! Core trait definition for provider-agnostic durable streams.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{
    DeliveredMessage, PublishAck, ReceiptHandle, StreamConfig, StreamHealthReport, StreamStats,
};
use crate::messaging::MessagingError;

/// Durable publish/subscribe over named subjects
///
/// Implementations provide the actual backend (pgmq, in-memory). Every backend
/// supports:
///
/// - Stream provisioning (idempotent, rejects incompatible redefinition)
/// - Publish with durable confirmation
/// - Fetch with an acknowledgement deadline, redelivering anything left unacked
/// - Acknowledge (remove) and negative-acknowledge (make visible again)
#[async_trait]
pub trait StreamService: Send + Sync + 'static {
    /// Provision a stream bound to its subjects
    ///
    /// Calling this again with an identical definition is a no-op. A stream with
    /// the same name but a different subject set, or a subject already bound to
    /// another stream, is a provisioning error.
    async fn ensure_stream(&self, config: &StreamConfig) -> Result<(), MessagingError>;

    /// Report which of the named streams exist
    async fn verify_streams(&self, names: &[String])
        -> Result<StreamHealthReport, MessagingError>;

    /// Append a payload to the stream bound to `subject`
    ///
    /// Returns only after the broker has durably stored the message.
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<PublishAck, MessagingError>;

    /// Deliver up to `max_messages` visible messages in append order
    ///
    /// Delivered messages stay invisible for `ack_wait`; if they are not
    /// acknowledged by then they are delivered again.
    async fn fetch(
        &self,
        subject: &str,
        max_messages: usize,
        ack_wait: Duration,
    ) -> Result<Vec<DeliveredMessage>, MessagingError>;

    /// Remove a delivered message permanently
    async fn ack(&self, receipt: &ReceiptHandle) -> Result<(), MessagingError>;

    /// Make a delivered message visible again immediately
    async fn nack(&self, receipt: &ReceiptHandle) -> Result<(), MessagingError>;

    async fn stream_stats(&self, name: &str) -> Result<StreamStats, MessagingError>;

    async fn health_check(&self) -> Result<bool, MessagingError>;

    fn provider_name(&self) -> &'static str;
}
