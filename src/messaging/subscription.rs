//! # Stream Subscription Loop
//!
//! Polls a subject, hands each delivered message to a [`MessageHandler`] one at a
//! time and acknowledges it according to the handler outcome. Per-message and
//! per-poll failures are logged and counted; they never end the loop. Only the
//! shutdown signal does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{FailurePolicy, SubscriptionConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::messaging::service::{DeliveredMessage, StreamProvider};
use crate::messaging::MessagingError;

/// Per-message processing contract
///
/// `Ok` acknowledges the message. `Err` is logged by the subscription loop and
/// the message is dropped or redelivered depending on [`FailurePolicy`].
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, message: &DeliveredMessage) -> PipelineResult<()>;

    /// Name used in log fields
    fn name(&self) -> &'static str;
}

/// Runtime settings for one subscription
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub batch_size: usize,
    /// Unacknowledged messages are redelivered after this long
    pub ack_wait: Duration,
    /// Sleep between polls that returned nothing
    pub poll_interval: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self::from(&SubscriptionConfig::default())
    }
}

impl From<&SubscriptionConfig> for SubscriberConfig {
    fn from(config: &SubscriptionConfig) -> Self {
        Self {
            batch_size: config.batch_size as usize,
            ack_wait: Duration::from_secs(config.ack_wait_seconds),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            failure_policy: config.failure_policy,
        }
    }
}

/// Runtime statistics for a subscription
#[derive(Debug, Default)]
pub struct SubscriptionStats {
    pub polls: AtomicU64,
    pub messages_received: AtomicU64,
    pub handled_ok: AtomicU64,
    pub handler_failures: AtomicU64,
    /// Failed messages acknowledged without success
    pub dropped: AtomicU64,
    /// Failed messages returned for redelivery
    pub requeued: AtomicU64,
    pub broker_errors: AtomicU64,
}

/// Point-in-time copy of [`SubscriptionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStatsSnapshot {
    pub polls: u64,
    pub messages_received: u64,
    pub handled_ok: u64,
    pub handler_failures: u64,
    pub dropped: u64,
    pub requeued: u64,
    pub broker_errors: u64,
}

impl SubscriptionStats {
    pub fn snapshot(&self) -> SubscriptionStatsSnapshot {
        SubscriptionStatsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            handled_ok: self.handled_ok.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            broker_errors: self.broker_errors.load(Ordering::Relaxed),
        }
    }
}

/// A running subscription
#[derive(Debug)]
pub struct SubscriptionHandle {
    subscriber_id: Uuid,
    subject: String,
    stats: Arc<SubscriptionStats>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn subscriber_id(&self) -> Uuid {
        self.subscriber_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn stats(&self) -> &SubscriptionStats {
        &self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit after shutdown was signalled
    pub async fn join(self) -> Result<SubscriptionStatsSnapshot, tokio::task::JoinError> {
        self.task.await?;
        Ok(self.stats.snapshot())
    }
}

/// Subscribes handlers to subjects on a shared provider
#[derive(Debug, Clone)]
pub struct StreamSubscriber {
    provider: Arc<StreamProvider>,
    config: SubscriberConfig,
}

impl StreamSubscriber {
    pub fn new(provider: Arc<StreamProvider>, config: SubscriberConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    /// Start delivering messages from `subject` to `handler` until shutdown
    pub fn subscribe<H: MessageHandler>(
        &self,
        subject: &str,
        handler: Arc<H>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> SubscriptionHandle {
        let subscriber_id = Uuid::new_v4();
        let stats = Arc::new(SubscriptionStats::default());

        info!(
            subscriber_id = %subscriber_id,
            subject = %subject,
            handler = handler.name(),
            provider = self.provider.provider_name(),
            batch_size = self.config.batch_size,
            ack_wait = ?self.config.ack_wait,
            "Starting subscription"
        );

        let subscriber = self.clone();
        let loop_subject = subject.to_string();
        let loop_stats = Arc::clone(&stats);
        let task = tokio::spawn(async move {
            subscriber
                .run(subscriber_id, &loop_subject, handler, &loop_stats, shutdown_rx)
                .await;
        });

        SubscriptionHandle {
            subscriber_id,
            subject: subject.to_string(),
            stats,
            task,
        }
    }

    async fn run<H: MessageHandler>(
        &self,
        subscriber_id: Uuid,
        subject: &str,
        handler: Arc<H>,
        stats: &SubscriptionStats,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            let processed = match self.poll_once(subject, handler.as_ref(), stats).await {
                Ok(count) => count,
                Err(e) => {
                    error!(
                        subscriber_id = %subscriber_id,
                        subject = %subject,
                        error = %e,
                        "Failed to fetch messages"
                    );
                    stats.broker_errors.fetch_add(1, Ordering::Relaxed);
                    0
                }
            };

            if processed > 0 {
                // Keep draining while there is work, but honour a pending shutdown
                match shutdown_rx.try_recv() {
                    Err(TryRecvError::Empty) => continue,
                    _ => break,
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(
            subscriber_id = %subscriber_id,
            subject = %subject,
            handler = handler.name(),
            "Subscription stopped"
        );
    }

    /// Fetch one batch and process it sequentially; returns the batch size
    pub async fn poll_once<H: MessageHandler + ?Sized>(
        &self,
        subject: &str,
        handler: &H,
        stats: &SubscriptionStats,
    ) -> Result<usize, MessagingError> {
        stats.polls.fetch_add(1, Ordering::Relaxed);

        let messages = self
            .provider
            .fetch(subject, self.config.batch_size, self.config.ack_wait)
            .await?;

        let count = messages.len();
        for message in messages {
            self.process_message(&message, handler, stats).await;
        }
        Ok(count)
    }

    async fn process_message<H: MessageHandler + ?Sized>(
        &self,
        message: &DeliveredMessage,
        handler: &H,
        stats: &SubscriptionStats,
    ) {
        stats.messages_received.fetch_add(1, Ordering::Relaxed);

        if message.is_redelivery() {
            debug!(
                subject = %message.subject(),
                message_id = %message.message_id(),
                receive_count = message.metadata.receive_count,
                "Processing redelivered message"
            );
        }

        match handler.handle(message).await {
            Ok(()) => {
                stats.handled_ok.fetch_add(1, Ordering::Relaxed);
                self.acknowledge(message, stats).await;
            }
            Err(e) => {
                stats.handler_failures.fetch_add(1, Ordering::Relaxed);
                if self.should_redeliver(&e) {
                    warn!(
                        handler = handler.name(),
                        subject = %message.subject(),
                        message_id = %message.message_id(),
                        error_kind = e.kind(),
                        error = %e,
                        "Handler failed, returning message for redelivery"
                    );
                    stats.requeued.fetch_add(1, Ordering::Relaxed);
                    if let Err(nack_err) = self.provider.nack(&message.receipt_handle).await {
                        error!(
                            receipt = %message.receipt_handle,
                            error = %nack_err,
                            "Failed to return message; it will reappear after the ack deadline"
                        );
                        stats.broker_errors.fetch_add(1, Ordering::Relaxed);
                    }
                } else {
                    warn!(
                        handler = handler.name(),
                        subject = %message.subject(),
                        message_id = %message.message_id(),
                        error_kind = e.kind(),
                        error = %e,
                        "Handler failed, dropping message"
                    );
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    self.acknowledge(message, stats).await;
                }
            }
        }
    }

    fn should_redeliver(&self, error: &PipelineError) -> bool {
        match self.config.failure_policy {
            FailurePolicy::Drop => false,
            FailurePolicy::RedeliverTransient => error.is_retryable(),
        }
    }

    async fn acknowledge(&self, message: &DeliveredMessage, stats: &SubscriptionStats) {
        if let Err(e) = self.provider.ack(&message.receipt_handle).await {
            // Left unacked, the message comes back after the deadline
            error!(
                receipt = %message.receipt_handle,
                error = %e,
                "Failed to acknowledge message"
            );
            stats.broker_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}
