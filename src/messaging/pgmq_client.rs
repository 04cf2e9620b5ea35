//! # PostgreSQL Message Queue Client (pgmq-rs)
//!
//! Thin client over the pgmq-rs crate plus the stream catalog that records which
//! subjects each durable stream binds. Every subject is backed by one pgmq queue
//! of the same name.

use std::time::Duration;

use chrono::{DateTime, Utc};
use pgmq::{types::Message, PGMQueue};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument, warn};

use crate::constants::STREAM_CATALOG_TABLE;
use crate::messaging::service::types::{validate_subject, StreamConfig};
use crate::messaging::{MessagingError, MessagingResult};

/// A row of the stream catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamBinding {
    pub name: String,
    pub subjects: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Queue metrics reported by `pgmq.metrics()`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub queue_name: String,
    pub message_count: i64,
    pub in_flight_count: i64,
    pub oldest_message_age_seconds: Option<i64>,
}

/// pgmq-rs based client with stream catalog support
#[derive(Debug, Clone)]
pub struct PgmqClient {
    pgmq: PGMQueue,
}

impl PgmqClient {
    /// Connect using a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> MessagingResult<Self> {
        info!("🚀 Connecting to pgmq broker");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| MessagingError::connection(format!("failed to connect to broker: {e}")))?;

        info!("✅ Connected to pgmq broker");
        Ok(Self::new_with_pool(pool).await)
    }

    /// Create a client over an existing connection pool
    pub async fn new_with_pool(pool: PgPool) -> Self {
        let pgmq = PGMQueue::new_with_pool(pool).await;
        Self { pgmq }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pgmq.connection
    }

    /// Install the pgmq extension and the stream catalog table if missing
    #[instrument(skip(self))]
    pub async fn ensure_catalog(&self) -> MessagingResult<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS pgmq CASCADE")
            .execute(self.pool())
            .await
            .map_err(|e| {
                MessagingError::stream_provision("*", format!("pgmq extension unavailable: {e}"))
            })?;

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {STREAM_CATALOG_TABLE} (
                name TEXT PRIMARY KEY,
                subjects TEXT[] NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"
        );
        sqlx::query(&ddl)
            .execute(self.pool())
            .await
            .map_err(|e| {
                MessagingError::stream_provision("*", format!("stream catalog unavailable: {e}"))
            })?;

        debug!("Stream catalog ready");
        Ok(())
    }

    /// Record the stream in the catalog and create its subject queues
    ///
    /// Provisioning is serialized across processes with a transaction-scoped
    /// advisory lock, so concurrent starts of different pipeline processes agree
    /// on a single binding.
    #[instrument(skip(self), fields(stream = %config.name))]
    pub async fn ensure_stream(&self, config: &StreamConfig) -> MessagingResult<()> {
        let provision_err =
            |e: sqlx::Error| MessagingError::stream_provision(&config.name, e.to_string());

        let mut tx = self.pool().begin().await.map_err(provision_err)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(STREAM_CATALOG_TABLE)
            .execute(&mut *tx)
            .await
            .map_err(provision_err)?;

        let existing: Option<Vec<String>> = sqlx::query_scalar(&format!(
            "SELECT subjects FROM {STREAM_CATALOG_TABLE} WHERE name = $1"
        ))
        .bind(&config.name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(provision_err)?;

        match existing {
            Some(subjects) if config.is_compatible_with(&subjects) => {
                debug!("Stream already provisioned with identical subjects");
            }
            Some(subjects) => {
                return Err(MessagingError::stream_provision(
                    &config.name,
                    format!(
                        "existing stream binds {subjects:?}, requested {:?}",
                        config.subjects
                    ),
                ));
            }
            None => {
                let conflicts = sqlx::query(&format!(
                    "SELECT name FROM {STREAM_CATALOG_TABLE} WHERE subjects && $1::text[]"
                ))
                .bind(&config.subjects)
                .fetch_all(&mut *tx)
                .await
                .map_err(provision_err)?;

                if let Some(row) = conflicts.first() {
                    let owner: String = row.try_get("name").map_err(provision_err)?;
                    return Err(MessagingError::stream_provision(
                        &config.name,
                        format!("subjects {:?} overlap stream {owner}", config.subjects),
                    ));
                }

                sqlx::query(&format!(
                    "INSERT INTO {STREAM_CATALOG_TABLE} (name, subjects) VALUES ($1, $2)"
                ))
                .bind(&config.name)
                .bind(&config.subjects)
                .execute(&mut *tx)
                .await
                .map_err(provision_err)?;

                info!(subjects = ?config.subjects, "📋 Stream registered");
            }
        }

        tx.commit().await.map_err(provision_err)?;

        for subject in &config.subjects {
            self.create_queue(subject)
                .await
                .map_err(|e| MessagingError::stream_provision(&config.name, e.to_string()))?;
        }

        Ok(())
    }

    /// Look up a stream definition by name
    pub async fn find_stream(&self, name: &str) -> MessagingResult<Option<StreamBinding>> {
        let row = sqlx::query(&format!(
            "SELECT name, subjects, created_at FROM {STREAM_CATALOG_TABLE} WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(StreamBinding {
            name: row.try_get("name")?,
            subjects: row.try_get("subjects")?,
            created_at: row.try_get("created_at")?,
        }))
    }

    /// Name of the stream that binds `subject`, if any
    pub async fn stream_for_subject(&self, subject: &str) -> MessagingResult<Option<String>> {
        let name: Option<String> = sqlx::query_scalar(&format!(
            "SELECT name FROM {STREAM_CATALOG_TABLE} WHERE $1 = ANY(subjects)"
        ))
        .bind(subject)
        .fetch_optional(self.pool())
        .await?;
        Ok(name)
    }

    /// Create queue if it doesn't exist
    pub async fn create_queue(&self, queue_name: &str) -> MessagingResult<()> {
        validate_subject(queue_name)?;
        debug!("📋 Creating queue: {}", queue_name);

        self.pgmq
            .create(queue_name)
            .await
            .map_err(|e| MessagingError::stream_provision(queue_name, e.to_string()))?;

        Ok(())
    }

    /// Send a JSON message, returning the assigned message id
    pub async fn send_json_message<T: Serialize>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> MessagingResult<i64> {
        let serialized = serde_json::to_value(message)?;
        let message_id = self
            .pgmq
            .send(queue_name, &serialized)
            .await
            .map_err(|e| MessagingError::publish(queue_name, e.to_string()))?;

        debug!(queue = %queue_name, message_id, "📤 Message sent");
        Ok(message_id)
    }

    /// Read up to `limit` messages, hiding them for `visibility_timeout` seconds
    pub async fn read_messages(
        &self,
        queue_name: &str,
        visibility_timeout: i32,
        limit: i32,
    ) -> MessagingResult<Vec<Message<serde_json::Value>>> {
        let messages = self
            .pgmq
            .read_batch(queue_name, Some(visibility_timeout), limit)
            .await
            .map_err(|e| MessagingError::fetch(queue_name, e.to_string()))?
            .unwrap_or_default();

        if !messages.is_empty() {
            debug!(queue = %queue_name, count = messages.len(), "📨 Read messages");
        }
        Ok(messages)
    }

    /// Archive a processed message (kept in the archive table for inspection)
    pub async fn archive_message(&self, queue_name: &str, message_id: i64) -> MessagingResult<()> {
        self.pgmq
            .archive(queue_name, message_id)
            .await
            .map_err(|e| MessagingError::acknowledge(queue_name, "archive", e.to_string()))?;
        Ok(())
    }

    /// Make a message visible again after `visibility_timeout` seconds
    pub async fn set_visibility_timeout(
        &self,
        queue_name: &str,
        message_id: i64,
        visibility_timeout: i32,
    ) -> MessagingResult<()> {
        let updated = sqlx::query("SELECT msg_id FROM pgmq.set_vt($1::text, $2::bigint, $3::integer)")
            .bind(queue_name)
            .bind(message_id)
            .bind(visibility_timeout)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| MessagingError::acknowledge(queue_name, "set_vt", e.to_string()))?;

        if updated.is_none() {
            return Err(MessagingError::message_not_found(
                queue_name,
                message_id.to_string(),
            ));
        }
        Ok(())
    }

    /// Queue depth, in-flight count and oldest message age
    pub async fn queue_metrics(&self, queue_name: &str) -> MessagingResult<QueueMetrics> {
        validate_subject(queue_name)?;

        let row = sqlx::query("SELECT queue_length, oldest_msg_age_sec FROM pgmq.metrics($1)")
            .bind(queue_name)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| MessagingError::stats(queue_name, e.to_string()))?;

        let (message_count, oldest_message_age_seconds) = match row {
            Some(row) => {
                let length: Option<i64> = row
                    .try_get("queue_length")
                    .map_err(|e| MessagingError::stats(queue_name, e.to_string()))?;
                let age: Option<i32> = row
                    .try_get("oldest_msg_age_sec")
                    .map_err(|e| MessagingError::stats(queue_name, e.to_string()))?;
                (length.unwrap_or(0), age.map(i64::from))
            }
            None => (0, None),
        };

        // queue_name is validated above, safe to interpolate
        let in_flight_count: i64 = sqlx::query_scalar(&format!(
            "SELECT count(*) FROM pgmq.q_{queue_name} WHERE vt > now()"
        ))
        .fetch_one(self.pool())
        .await
        .map_err(|e| MessagingError::stats(queue_name, e.to_string()))?;

        Ok(QueueMetrics {
            queue_name: queue_name.to_string(),
            message_count,
            in_flight_count,
            oldest_message_age_seconds,
        })
    }

    /// Health check - verify database connectivity
    pub async fn health_check(&self) -> MessagingResult<bool> {
        match sqlx::query("SELECT 1").fetch_one(self.pool()).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(error = %e, "Broker health check failed");
                Ok(false)
            }
        }
    }
}
