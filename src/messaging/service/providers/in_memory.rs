//! # In-Memory Stream Service
//!
//! Thread-safe in-memory streams for testing and development.
//!
//! ## Features
//!
//! - **Acknowledgement deadline**: delivered messages turn invisible and come back
//!   if they are not acknowledged in time
//! - **Thread-Safe**: uses `tokio::sync::RwLock` for concurrent access
//! - **Same provisioning rules as pgmq**: identical redefinition is a no-op,
//!   conflicting subject sets are rejected
//!
//! Messages live for the lifetime of the service only.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::messaging::service::traits::StreamService;
use crate::messaging::service::types::{
    DeliveredMessage, MessageId, MessageMetadata, PublishAck, ReceiptHandle, StreamConfig,
    StreamCounters, StreamHealthReport, StreamStats,
};
use crate::messaging::MessagingError;

/// Stored message with visibility tracking
#[derive(Debug, Clone)]
struct InMemoryStoredMessage {
    id: i64,
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    /// When the message becomes visible again (None = visible now)
    visible_at: Option<DateTime<Utc>>,
    receive_count: u32,
}

impl InMemoryStoredMessage {
    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.visible_at.map(|vt| vt <= now).unwrap_or(true)
    }
}

/// Append log for one subject
#[derive(Debug)]
struct InMemorySubjectLog {
    /// Owning stream name
    stream: String,
    /// Messages in append order
    messages: VecDeque<InMemoryStoredMessage>,
    next_id: AtomicU64,
    total_published: AtomicU64,
    total_delivered: AtomicU64,
    total_acked: AtomicU64,
    total_nacked: AtomicU64,
}

impl InMemorySubjectLog {
    fn new(stream: &str) -> Self {
        Self {
            stream: stream.to_string(),
            messages: VecDeque::new(),
            next_id: AtomicU64::new(1),
            total_published: AtomicU64::new(0),
            total_delivered: AtomicU64::new(0),
            total_acked: AtomicU64::new(0),
            total_nacked: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    /// stream name -> definition
    streams: HashMap<String, StreamConfig>,
    /// subject -> append log
    subjects: HashMap<String, InMemorySubjectLog>,
}

/// In-memory stream service for tests and local runs
///
/// ```rust
/// use statewatch::messaging::{InMemoryStreamService, StreamConfig, StreamService};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = InMemoryStreamService::new();
/// service.ensure_stream(&StreamConfig::new("KAFKA_STREAM", ["kafka_state"])).await?;
///
/// service.publish("kafka_state", br#"{"id":1}"#).await?;
///
/// let delivered = service.fetch("kafka_state", 10, Duration::from_secs(30)).await?;
/// for message in &delivered {
///     service.ack(&message.receipt_handle).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStreamService {
    state: RwLock<InMemoryState>,
}

impl InMemoryStreamService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages stored for a subject, acknowledged ones excluded (for testing)
    pub async fn pending_count(&self, subject: &str) -> usize {
        let state = self.state.read().await;
        state
            .subjects
            .get(subject)
            .map(|log| log.messages.len())
            .unwrap_or(0)
    }

    /// Number of provisioned streams (for testing)
    pub async fn stream_count(&self) -> usize {
        self.state.read().await.streams.len()
    }

    fn to_chrono(duration: Duration) -> Result<chrono::Duration, MessagingError> {
        chrono::Duration::from_std(duration)
            .map_err(|e| MessagingError::internal(format!("invalid ack wait: {e}")))
    }
}

#[async_trait]
impl StreamService for InMemoryStreamService {
    async fn ensure_stream(&self, config: &StreamConfig) -> Result<(), MessagingError> {
        config.validate()?;

        let mut state = self.state.write().await;

        if let Some(existing) = state.streams.get(&config.name) {
            if config.is_compatible_with(&existing.subjects) {
                debug!(stream = %config.name, "Stream already exists with identical subjects");
                return Ok(());
            }
            return Err(MessagingError::stream_provision(
                &config.name,
                format!(
                    "existing stream binds {:?}, requested {:?}",
                    existing.subjects, config.subjects
                ),
            ));
        }

        for subject in &config.subjects {
            if let Some(log) = state.subjects.get(subject) {
                return Err(MessagingError::stream_provision(
                    &config.name,
                    format!("subject {subject} is already bound to stream {}", log.stream),
                ));
            }
        }

        for subject in &config.subjects {
            state
                .subjects
                .insert(subject.clone(), InMemorySubjectLog::new(&config.name));
        }
        state.streams.insert(config.name.clone(), config.clone());

        debug!(stream = %config.name, subjects = ?config.subjects, "Stream created");
        Ok(())
    }

    async fn verify_streams(
        &self,
        names: &[String],
    ) -> Result<StreamHealthReport, MessagingError> {
        let state = self.state.read().await;
        let mut report = StreamHealthReport::new();

        for name in names {
            if state.streams.contains_key(name) {
                report.add_healthy(name);
            } else {
                report.add_missing(name);
            }
        }

        Ok(report)
    }

    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<PublishAck, MessagingError> {
        let mut state = self.state.write().await;
        let log = state
            .subjects
            .get_mut(subject)
            .ok_or_else(|| MessagingError::subject_not_bound(subject))?;

        let id = log.next_id.fetch_add(1, Ordering::Relaxed) as i64;
        log.total_published.fetch_add(1, Ordering::Relaxed);

        log.messages.push_back(InMemoryStoredMessage {
            id,
            payload: payload.to_vec(),
            enqueued_at: Utc::now(),
            visible_at: None,
            receive_count: 0,
        });

        Ok(PublishAck {
            stream: log.stream.clone(),
            subject: subject.to_string(),
            message_id: MessageId(id),
        })
    }

    async fn fetch(
        &self,
        subject: &str,
        max_messages: usize,
        ack_wait: Duration,
    ) -> Result<Vec<DeliveredMessage>, MessagingError> {
        let ack_wait = Self::to_chrono(ack_wait)?;

        let mut state = self.state.write().await;
        let log = state
            .subjects
            .get_mut(subject)
            .ok_or_else(|| MessagingError::subject_not_bound(subject))?;

        let now = Utc::now();
        let visible_until = now + ack_wait;
        let mut delivered = Vec::new();

        for msg in log.messages.iter_mut() {
            if delivered.len() >= max_messages {
                break;
            }
            if !msg.is_visible(now) {
                continue;
            }

            msg.visible_at = Some(visible_until);
            msg.receive_count += 1;
            log.total_delivered.fetch_add(1, Ordering::Relaxed);

            delivered.push(DeliveredMessage::new(
                ReceiptHandle::new(subject, msg.id),
                msg.payload.clone(),
                MessageMetadata::new(msg.receive_count, msg.enqueued_at),
            ));
        }

        Ok(delivered)
    }

    async fn ack(&self, receipt: &ReceiptHandle) -> Result<(), MessagingError> {
        let mut state = self.state.write().await;
        let log = state
            .subjects
            .get_mut(&receipt.subject)
            .ok_or_else(|| MessagingError::subject_not_bound(&receipt.subject))?;

        let position = log
            .messages
            .iter()
            .position(|m| m.id == receipt.message_id.0)
            .ok_or_else(|| {
                MessagingError::message_not_found(&receipt.subject, receipt.message_id.to_string())
            })?;

        log.messages.remove(position);
        log.total_acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self, receipt: &ReceiptHandle) -> Result<(), MessagingError> {
        let mut state = self.state.write().await;
        let log = state
            .subjects
            .get_mut(&receipt.subject)
            .ok_or_else(|| MessagingError::subject_not_bound(&receipt.subject))?;

        let msg = log
            .messages
            .iter_mut()
            .find(|m| m.id == receipt.message_id.0)
            .ok_or_else(|| {
                MessagingError::message_not_found(&receipt.subject, receipt.message_id.to_string())
            })?;

        msg.visible_at = None;
        log.total_nacked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stream_stats(&self, name: &str) -> Result<StreamStats, MessagingError> {
        let state = self.state.read().await;
        let config = state
            .streams
            .get(name)
            .ok_or_else(|| MessagingError::stream_not_found(name))?;

        let now = Utc::now();
        let mut message_count = 0u64;
        let mut in_flight_count = 0u64;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut counters = StreamCounters::default();

        for log in config
            .subjects
            .iter()
            .filter_map(|subject| state.subjects.get(subject))
        {
            message_count += log.messages.len() as u64;
            in_flight_count += log.messages.iter().filter(|m| !m.is_visible(now)).count() as u64;
            if let Some(front) = log.messages.front() {
                oldest = Some(oldest.map_or(front.enqueued_at, |o| o.min(front.enqueued_at)));
            }
            counters.total_published += log.total_published.load(Ordering::Relaxed);
            counters.total_delivered += log.total_delivered.load(Ordering::Relaxed);
            counters.total_acked += log.total_acked.load(Ordering::Relaxed);
            counters.total_nacked += log.total_nacked.load(Ordering::Relaxed);
        }

        let mut stats = StreamStats::new(name, config.subjects.clone(), message_count)
            .with_in_flight_count(in_flight_count)
            .with_counters(counters);

        if let Some(age) = oldest.and_then(|o| (now - o).to_std().ok()) {
            stats = stats.with_oldest_message_age(age);
        }

        Ok(stats)
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
