//! # Stream Service Types
//!
//! Core types for the provider-agnostic stream abstraction.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::constants::MAX_SUBJECT_LENGTH;
use crate::messaging::MessagingError;

/// Identifier assigned by the broker to an appended message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Handle for acknowledging a delivered message
///
/// Carries the subject so that ack/nack never need a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle {
    pub subject: String,
    pub message_id: MessageId,
}

impl ReceiptHandle {
    pub fn new(subject: impl Into<String>, message_id: impl Into<MessageId>) -> Self {
        Self {
            subject: subject.into(),
            message_id: message_id.into(),
        }
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject, self.message_id)
    }
}

/// Broker-side bookkeeping for a delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetadata {
    /// Number of times the message has been delivered, including this one
    pub receive_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl MessageMetadata {
    pub fn new(receive_count: u32, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            receive_count,
            enqueued_at,
        }
    }
}

/// A message delivered to a subscriber, payload left opaque
#[derive(Debug, Clone)]
pub struct DeliveredMessage {
    pub receipt_handle: ReceiptHandle,
    pub payload: Vec<u8>,
    pub metadata: MessageMetadata,
}

impl DeliveredMessage {
    pub fn new(receipt_handle: ReceiptHandle, payload: Vec<u8>, metadata: MessageMetadata) -> Self {
        Self {
            receipt_handle,
            payload,
            metadata,
        }
    }

    pub fn subject(&self) -> &str {
        &self.receipt_handle.subject
    }

    pub fn message_id(&self) -> MessageId {
        self.receipt_handle.message_id
    }

    /// True when an earlier delivery was never acknowledged
    pub fn is_redelivery(&self) -> bool {
        self.metadata.receive_count > 1
    }
}

/// Confirmation that a publish was durably appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    pub stream: String,
    pub subject: String,
    pub message_id: MessageId,
}

/// Durable stream definition: a name plus the subjects it binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub name: String,
    pub subjects: Vec<String>,
}

impl StreamConfig {
    pub fn new<I, S>(name: impl Into<String>, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }

    /// Order-insensitive view of the bound subjects
    pub fn subject_set(&self) -> BTreeSet<&str> {
        self.subjects.iter().map(String::as_str).collect()
    }

    /// Whether an existing binding matches this definition
    pub fn is_compatible_with(&self, existing_subjects: &[String]) -> bool {
        let existing: BTreeSet<&str> = existing_subjects.iter().map(String::as_str).collect();
        existing == self.subject_set()
    }

    /// Check the stream name and every subject before touching the broker
    pub fn validate(&self) -> Result<(), MessagingError> {
        if self.name.trim().is_empty() {
            return Err(MessagingError::stream_provision(
                &self.name,
                "stream name must not be empty",
            ));
        }
        if self.subjects.is_empty() {
            return Err(MessagingError::stream_provision(
                &self.name,
                "a stream must bind at least one subject",
            ));
        }
        if self.subject_set().len() != self.subjects.len() {
            return Err(MessagingError::stream_provision(
                &self.name,
                "duplicate subjects in stream definition",
            ));
        }
        for subject in &self.subjects {
            validate_subject(subject)?;
        }
        Ok(())
    }
}

/// Subjects double as pgmq queue names, so they follow its naming rules
pub fn validate_subject(subject: &str) -> Result<(), MessagingError> {
    if subject.is_empty() {
        return Err(MessagingError::invalid_subject(subject, "subject is empty"));
    }
    if subject.len() > MAX_SUBJECT_LENGTH {
        return Err(MessagingError::invalid_subject(
            subject,
            format!("longer than {MAX_SUBJECT_LENGTH} characters"),
        ));
    }
    if !subject
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(MessagingError::invalid_subject(
            subject,
            "only lowercase ASCII letters, digits and '_' are allowed",
        ));
    }
    Ok(())
}

/// Stream statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub stream: String,
    pub subjects: Vec<String>,

    /// Messages appended and not yet acknowledged (visible + in flight)
    pub message_count: u64,

    /// Messages delivered and awaiting acknowledgement
    pub in_flight_count: Option<u64>,

    pub oldest_message_age: Option<Duration>,

    /// Lifetime counters; only the in-memory provider tracks these
    pub counters: Option<StreamCounters>,
}

impl StreamStats {
    pub fn new(stream: impl Into<String>, subjects: Vec<String>, message_count: u64) -> Self {
        Self {
            stream: stream.into(),
            subjects,
            message_count,
            ..Self::default()
        }
    }

    pub fn with_in_flight_count(mut self, count: u64) -> Self {
        self.in_flight_count = Some(count);
        self
    }

    pub fn with_oldest_message_age(mut self, age: Duration) -> Self {
        self.oldest_message_age = Some(age);
        self
    }

    pub fn with_counters(mut self, counters: StreamCounters) -> Self {
        self.counters = Some(counters);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCounters {
    pub total_published: u64,
    pub total_delivered: u64,
    pub total_acked: u64,
    pub total_nacked: u64,
}

/// Result of verifying that expected streams exist
#[derive(Debug, Clone, Default)]
pub struct StreamHealthReport {
    pub healthy: Vec<String>,
    pub missing: Vec<String>,
    pub errors: Vec<(String, String)>,
}

impl StreamHealthReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_healthy(&self) -> bool {
        self.missing.is_empty() && self.errors.is_empty()
    }

    pub fn add_healthy(&mut self, stream: impl Into<String>) {
        self.healthy.push(stream.into());
    }

    pub fn add_missing(&mut self, stream: impl Into<String>) {
        self.missing.push(stream.into());
    }

    pub fn add_error(&mut self, stream: impl Into<String>, error: impl Into<String>) {
        self.errors.push((stream.into(), error.into()));
    }
}
