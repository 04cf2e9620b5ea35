//! # PGMQ Stream Service
//!
//! Durable streams on PostgreSQL via the pgmq extension.
//!
//! ## Features
//!
//! - **Durability**: messages live in pgmq tables and survive process and broker restarts
//! - **Redelivery**: pgmq visibility timeouts act as the acknowledgement deadline
//! - **Stream catalog**: stream to subject bindings are recorded once and checked on
//!   every provisioning call
//! - **Wire format**: JSON object payloads are stored as the object itself; any other
//!   bytes travel base64-encoded inside a JSON envelope, so even malformed payloads
//!   reach the subscriber unchanged

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::messaging::pgmq_client::PgmqClient;
use crate::messaging::service::traits::StreamService;
use crate::messaging::service::types::{
    DeliveredMessage, MessageId, MessageMetadata, PublishAck, ReceiptHandle, StreamConfig,
    StreamHealthReport, StreamStats,
};
use crate::messaging::MessagingError;

/// JSON wrapper stored in pgmq for payloads that are not a JSON object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEnvelope {
    pub stream: String,
    pub subject: String,
    /// Base64 encoded payload bytes
    pub data: String,
    pub published_at: DateTime<Utc>,
}

impl StreamEnvelope {
    pub fn wrap(stream: &str, subject: &str, payload: &[u8]) -> Self {
        Self {
            stream: stream.to_string(),
            subject: subject.to_string(),
            data: BASE64.encode(payload),
            published_at: Utc::now(),
        }
    }

    /// Message body stored in pgmq for a payload
    ///
    /// A JSON object is stored as-is, unless it would be mistaken for an envelope
    /// on the way out. Everything else is wrapped.
    pub fn encode(
        stream: &str,
        subject: &str,
        payload: &[u8],
    ) -> Result<serde_json::Value, MessagingError> {
        match serde_json::from_slice::<serde_json::Value>(payload) {
            Ok(value @ serde_json::Value::Object(_))
                if serde_json::from_value::<StreamEnvelope>(value.clone()).is_err() =>
            {
                Ok(value)
            }
            _ => Ok(serde_json::to_value(Self::wrap(stream, subject, payload))?),
        }
    }

    /// Recover payload bytes from a stored pgmq message
    ///
    /// Messages written by other publishers without the envelope are handed over
    /// as their raw JSON text.
    pub fn unwrap_payload(value: serde_json::Value) -> Result<Vec<u8>, MessagingError> {
        if let Ok(envelope) = serde_json::from_value::<StreamEnvelope>(value.clone()) {
            if let Ok(bytes) = BASE64.decode(envelope.data.as_bytes()) {
                return Ok(bytes);
            }
        }
        Ok(serde_json::to_vec(&value)?)
    }
}

/// PGMQ-based stream service
#[derive(Debug)]
pub struct PgmqStreamService {
    client: PgmqClient,
    /// subject -> stream, filled on provisioning and on first publish
    bindings: RwLock<HashMap<String, String>>,
}

impl PgmqStreamService {
    /// Connect to the broker and make sure the stream catalog exists
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, MessagingError> {
        let client = PgmqClient::new(database_url, max_connections, connect_timeout).await?;
        client.ensure_catalog().await?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: PgmqClient) -> Self {
        Self {
            client,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &PgmqClient {
        &self.client
    }

    /// Stream bound to a subject, consulting the catalog on a cache miss
    async fn resolve_stream(&self, subject: &str) -> Result<String, MessagingError> {
        if let Some(stream) = self.bindings.read().await.get(subject) {
            return Ok(stream.clone());
        }

        let stream = self
            .client
            .stream_for_subject(subject)
            .await?
            .ok_or_else(|| MessagingError::subject_not_bound(subject))?;

        self.bindings
            .write()
            .await
            .insert(subject.to_string(), stream.clone());
        Ok(stream)
    }

    /// Whole seconds, rounded up, at least one; pgmq visibility is second-granular
    fn visibility_seconds(ack_wait: Duration) -> i32 {
        let secs = ack_wait.as_secs() + u64::from(ack_wait.subsec_nanos() > 0);
        i32::try_from(secs.max(1)).unwrap_or(i32::MAX)
    }
}

#[async_trait]
impl StreamService for PgmqStreamService {
    async fn ensure_stream(&self, config: &StreamConfig) -> Result<(), MessagingError> {
        config.validate()?;
        self.client.ensure_stream(config).await?;

        let mut bindings = self.bindings.write().await;
        for subject in &config.subjects {
            bindings.insert(subject.clone(), config.name.clone());
        }

        info!(stream = %config.name, subjects = ?config.subjects, "✅ Stream ready");
        Ok(())
    }

    async fn verify_streams(
        &self,
        names: &[String],
    ) -> Result<StreamHealthReport, MessagingError> {
        let mut report = StreamHealthReport::new();

        for name in names {
            match self.client.find_stream(name).await {
                Ok(Some(_)) => report.add_healthy(name),
                Ok(None) => report.add_missing(name),
                Err(e) => report.add_error(name, e.to_string()),
            }
        }

        Ok(report)
    }

    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<PublishAck, MessagingError> {
        let stream = self.resolve_stream(subject).await?;
        let body = StreamEnvelope::encode(&stream, subject, payload)?;

        let message_id = self.client.send_json_message(subject, &body).await?;

        Ok(PublishAck {
            stream,
            subject: subject.to_string(),
            message_id: MessageId(message_id),
        })
    }

    async fn fetch(
        &self,
        subject: &str,
        max_messages: usize,
        ack_wait: Duration,
    ) -> Result<Vec<DeliveredMessage>, MessagingError> {
        let limit = i32::try_from(max_messages).unwrap_or(i32::MAX);
        let messages = self
            .client
            .read_messages(subject, Self::visibility_seconds(ack_wait), limit)
            .await?;

        messages
            .into_iter()
            .map(|msg| {
                let payload = StreamEnvelope::unwrap_payload(msg.message)?;
                Ok(DeliveredMessage::new(
                    ReceiptHandle::new(subject, msg.msg_id),
                    payload,
                    MessageMetadata::new(u32::try_from(msg.read_ct).unwrap_or(0), msg.enqueued_at),
                ))
            })
            .collect()
    }

    async fn ack(&self, receipt: &ReceiptHandle) -> Result<(), MessagingError> {
        self.client
            .archive_message(&receipt.subject, receipt.message_id.0)
            .await
    }

    async fn nack(&self, receipt: &ReceiptHandle) -> Result<(), MessagingError> {
        debug!(receipt = %receipt, "Returning message for redelivery");
        self.client
            .set_visibility_timeout(&receipt.subject, receipt.message_id.0, 0)
            .await
    }

    async fn stream_stats(&self, name: &str) -> Result<StreamStats, MessagingError> {
        let binding = self
            .client
            .find_stream(name)
            .await?
            .ok_or_else(|| MessagingError::stream_not_found(name))?;

        let mut message_count = 0u64;
        let mut in_flight_count = 0u64;
        let mut oldest_age: Option<u64> = None;

        for subject in &binding.subjects {
            let metrics = self.client.queue_metrics(subject).await?;
            message_count += u64::try_from(metrics.message_count).unwrap_or(0);
            in_flight_count += u64::try_from(metrics.in_flight_count).unwrap_or(0);
            if let Some(age) = metrics
                .oldest_message_age_seconds
                .and_then(|a| u64::try_from(a).ok())
            {
                oldest_age = Some(oldest_age.map_or(age, |o| o.max(age)));
            }
        }

        let mut stats = StreamStats::new(name, binding.subjects, message_count)
            .with_in_flight_count(in_flight_count);
        if let Some(age) = oldest_age {
            stats = stats.with_oldest_message_age(Duration::from_secs(age));
        }
        Ok(stats)
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        self.client.health_check().await
    }

    fn provider_name(&self) -> &'static str {
        "pgmq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_round_trip_preserves_bytes() {
        let raw = b"{not valid json".to_vec();
        let envelope = StreamEnvelope::wrap("KAFKA_STREAM", "kafka_state", &raw);
        let stored = serde_json::to_value(&envelope).unwrap();

        assert_eq!(StreamEnvelope::unwrap_payload(stored).unwrap(), raw);
    }

    #[test]
    fn test_record_payload_is_stored_as_the_record() {
        let payload = br#"{"id":1,"status":"ok","message":"ok no changes needed"}"#;
        let stored = StreamEnvelope::encode("ANALYZED_STREAM", "analyzed_state", payload).unwrap();

        assert_eq!(
            stored,
            json!({"id": 1, "status": "ok", "message": "ok no changes needed"})
        );
        let decoded: serde_json::Value =
            serde_json::from_slice(&StreamEnvelope::unwrap_payload(stored).unwrap()).unwrap();
        assert_eq!(decoded["message"], "ok no changes needed");
    }

    #[test]
    fn test_non_object_payloads_are_enveloped() {
        let payloads: [&[u8]; 3] = [b"\xff\xfe not json", b"[1,2]", b"42"];
        for payload in payloads {
            let stored = StreamEnvelope::encode("KAFKA_STREAM", "kafka_state", payload).unwrap();
            assert!(serde_json::from_value::<StreamEnvelope>(stored.clone()).is_ok());
            assert_eq!(StreamEnvelope::unwrap_payload(stored).unwrap(), payload);
        }
    }

    #[test]
    fn test_envelope_shaped_payload_is_wrapped_again() {
        let inner = StreamEnvelope::wrap("KAFKA_STREAM", "kafka_state", b"inner");
        let payload = serde_json::to_vec(&inner).unwrap();

        let stored = StreamEnvelope::encode("KAFKA_STREAM", "kafka_state", &payload).unwrap();
        assert_eq!(StreamEnvelope::unwrap_payload(stored).unwrap(), payload);
    }

    #[test]
    fn test_foreign_json_message_is_passed_through() {
        let foreign = json!({"id": 3, "name": "n", "is_healthy": true, "message": "m"});
        let payload = StreamEnvelope::unwrap_payload(foreign.clone()).unwrap();

        let decoded: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded, foreign);
    }

    #[test]
    fn test_visibility_seconds_rounds_up() {
        assert_eq!(PgmqStreamService::visibility_seconds(Duration::from_secs(30)), 30);
        assert_eq!(PgmqStreamService::visibility_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(PgmqStreamService::visibility_seconds(Duration::ZERO), 1);
    }
}
