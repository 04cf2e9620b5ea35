//! # Stream Provider Enum
//!
//! Enum dispatch over the stream backends, avoiding trait object overhead.

use std::time::Duration;

use super::providers::{InMemoryStreamService, PgmqStreamService};
use super::traits::StreamService;
use super::types::{
    DeliveredMessage, PublishAck, ReceiptHandle, StreamConfig, StreamHealthReport, StreamStats,
};
use crate::messaging::MessagingError;

/// Provider enum for static dispatch
///
/// Components hold an `Arc<StreamProvider>` and never name a concrete backend:
///
/// - `Pgmq` - durable streams on PostgreSQL
/// - `InMemory` - process-local streams for tests and development
#[derive(Debug)]
pub enum StreamProvider {
    Pgmq(PgmqStreamService),
    InMemory(InMemoryStreamService),
}

impl StreamProvider {
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Pgmq(s) => s.provider_name(),
            Self::InMemory(s) => s.provider_name(),
        }
    }

    /// Provision a stream (idempotent)
    pub async fn ensure_stream(&self, config: &StreamConfig) -> Result<(), MessagingError> {
        match self {
            Self::Pgmq(s) => s.ensure_stream(config).await,
            Self::InMemory(s) => s.ensure_stream(config).await,
        }
    }

    pub async fn verify_streams(
        &self,
        names: &[String],
    ) -> Result<StreamHealthReport, MessagingError> {
        match self {
            Self::Pgmq(s) => s.verify_streams(names).await,
            Self::InMemory(s) => s.verify_streams(names).await,
        }
    }

    pub async fn publish(
        &self,
        subject: &str,
        payload: &[u8],
    ) -> Result<PublishAck, MessagingError> {
        match self {
            Self::Pgmq(s) => s.publish(subject, payload).await,
            Self::InMemory(s) => s.publish(subject, payload).await,
        }
    }

    pub async fn fetch(
        &self,
        subject: &str,
        max_messages: usize,
        ack_wait: Duration,
    ) -> Result<Vec<DeliveredMessage>, MessagingError> {
        match self {
            Self::Pgmq(s) => s.fetch(subject, max_messages, ack_wait).await,
            Self::InMemory(s) => s.fetch(subject, max_messages, ack_wait).await,
        }
    }

    pub async fn ack(&self, receipt: &ReceiptHandle) -> Result<(), MessagingError> {
        match self {
            Self::Pgmq(s) => s.ack(receipt).await,
            Self::InMemory(s) => s.ack(receipt).await,
        }
    }

    pub async fn nack(&self, receipt: &ReceiptHandle) -> Result<(), MessagingError> {
        match self {
            Self::Pgmq(s) => s.nack(receipt).await,
            Self::InMemory(s) => s.nack(receipt).await,
        }
    }

    pub async fn stream_stats(&self, name: &str) -> Result<StreamStats, MessagingError> {
        match self {
            Self::Pgmq(s) => s.stream_stats(name).await,
            Self::InMemory(s) => s.stream_stats(name).await,
        }
    }

    pub async fn health_check(&self) -> Result<bool, MessagingError> {
        match self {
            Self::Pgmq(s) => s.health_check().await,
            Self::InMemory(s) => s.health_check().await,
        }
    }

    /// The in-memory backend, when that is what this provider wraps
    pub fn as_in_memory(&self) -> Option<&InMemoryStreamService> {
        match self {
            Self::InMemory(s) => Some(s),
            Self::Pgmq(_) => None,
        }
    }
}

impl From<PgmqStreamService> for StreamProvider {
    fn from(service: PgmqStreamService) -> Self {
        Self::Pgmq(service)
    }
}

impl From<InMemoryStreamService> for StreamProvider {
    fn from(service: InMemoryStreamService) -> Self {
        Self::InMemory(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_dispatch() {
        let provider = StreamProvider::from(InMemoryStreamService::new());
        assert_eq!(provider.provider_name(), "in_memory");
        assert!(provider.as_in_memory().is_some());

        let config = StreamConfig::new("ANALYZED_STREAM", ["analyzed_state"]);
        provider.ensure_stream(&config).await.unwrap();
        provider.ensure_stream(&config).await.unwrap();

        let ack = provider.publish("analyzed_state", b"{}").await.unwrap();
        assert_eq!(ack.stream, "ANALYZED_STREAM");

        let delivered = provider
            .fetch("analyzed_state", 1, Duration::from_secs(5))
            .await
            .unwrap();
        provider.ack(&delivered[0].receipt_handle).await.unwrap();

        let stats = provider.stream_stats("ANALYZED_STREAM").await.unwrap();
        assert_eq!(stats.message_count, 0);
        assert!(provider.health_check().await.unwrap());
    }
}
