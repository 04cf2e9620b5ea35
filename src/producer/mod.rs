//! # State Producer
//!
//! Samples the monitored system on a fixed interval and publishes each sample on
//! `kafka_state`. Every tick is independent: a failed fetch or publish is logged
//! and the tick is skipped, with no retry and no backoff.

pub mod state_source;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::constants::KAFKA_STATE_SUBJECT;
use crate::error::PipelineError;
use crate::messaging::{PublishAck, StreamProvider};

pub use state_source::{FixtureStateSource, HttpStateSource, StateSource};

/// Result of a single sampling tick
#[derive(Debug)]
pub enum TickOutcome {
    Published { state_id: i64, ack: PublishAck },
    FetchFailed(PipelineError),
    EncodeFailed(PipelineError),
    PublishFailed(PipelineError),
}

impl TickOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

#[derive(Debug, Default)]
pub struct ProducerStats {
    pub ticks: AtomicU64,
    pub published: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub encode_failures: AtomicU64,
    pub publish_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStatsSnapshot {
    pub ticks: u64,
    pub published: u64,
    pub fetch_failures: u64,
    pub encode_failures: u64,
    pub publish_failures: u64,
}

impl ProducerStats {
    pub fn snapshot(&self) -> ProducerStatsSnapshot {
        ProducerStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// Periodic sampler publishing to `kafka_state`
pub struct StateProducer {
    provider: Arc<StreamProvider>,
    source: Arc<dyn StateSource>,
    interval: Duration,
    stats: ProducerStats,
}

impl std::fmt::Debug for StateProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProducer")
            .field("provider", &self.provider.provider_name())
            .field("source", &self.source.describe())
            .field("interval", &self.interval)
            .finish()
    }
}

impl StateProducer {
    pub fn new(
        provider: Arc<StreamProvider>,
        source: Arc<dyn StateSource>,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            source,
            interval,
            stats: ProducerStats::default(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> &ProducerStats {
        &self.stats
    }

    /// Fetch one sample and publish it
    pub async fn tick(&self) -> TickOutcome {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let record = match self.source.fetch_state().await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    source = %self.source.describe(),
                    error = %e,
                    "Failed to fetch state, skipping tick"
                );
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::FetchFailed(e);
            }
        };

        let payload = match record.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(state_id = record.id, error = %e, "Failed to encode state, skipping tick");
                self.stats.encode_failures.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::EncodeFailed(e);
            }
        };

        match self.provider.publish(KAFKA_STATE_SUBJECT, &payload).await {
            Ok(ack) => {
                debug!(
                    state_id = record.id,
                    is_healthy = record.is_healthy,
                    subject = KAFKA_STATE_SUBJECT,
                    message_id = %ack.message_id,
                    "Published state"
                );
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                TickOutcome::Published {
                    state_id: record.id,
                    ack,
                }
            }
            Err(e) => {
                let e = PipelineError::publish(KAFKA_STATE_SUBJECT, e);
                warn!(state_id = record.id, error = %e, "Failed to publish state, skipping tick");
                self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                TickOutcome::PublishFailed(e)
            }
        }
    }

    /// Tick every interval until shutdown; the first tick fires one interval after start
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> ProducerStatsSnapshot {
        info!(
            source = %self.source.describe(),
            interval = ?self.interval,
            provider = self.provider.provider_name(),
            "🚀 State producer started"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        let snapshot = self.stats.snapshot();
        info!(
            ticks = snapshot.ticks,
            published = snapshot.published,
            "State producer stopped"
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::streams;
    use crate::messaging::InMemoryStreamService;
    use crate::models::StateRecord;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FailingSource;

    #[async_trait]
    impl StateSource for FailingSource {
        async fn fetch_state(&self) -> crate::error::PipelineResult<StateRecord> {
            Err(PipelineError::state_fetch("failing", "source unreachable"))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    async fn provisioned_provider() -> Arc<StreamProvider> {
        let provider = Arc::new(StreamProvider::from(InMemoryStreamService::new()));
        provider.ensure_stream(&streams::kafka_stream()).await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_tick_publishes_one_state() {
        let provider = provisioned_provider().await;
        let producer = StateProducer::new(
            Arc::clone(&provider),
            Arc::new(FixtureStateSource::with_seed(1)),
            Duration::from_secs(10),
        );

        let outcome = producer.tick().await;
        assert!(outcome.is_published());

        let delivered = provider
            .fetch(KAFKA_STATE_SUBJECT, 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(delivered.len(), 1);

        let record = StateRecord::from_payload(&delivered[0].payload).unwrap();
        assert!((1..=50).contains(&record.id));
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_tick() {
        let provider = provisioned_provider().await;
        let producer = StateProducer::new(
            Arc::clone(&provider),
            Arc::new(FailingSource),
            Duration::from_secs(10),
        );

        assert!(matches!(producer.tick().await, TickOutcome::FetchFailed(_)));
        assert!(matches!(producer.tick().await, TickOutcome::FetchFailed(_)));

        let snapshot = producer.stats().snapshot();
        assert_eq!(snapshot.ticks, 2);
        assert_eq!(snapshot.fetch_failures, 2);
        assert_eq!(
            provider.as_in_memory().unwrap().pending_count(KAFKA_STATE_SUBJECT).await,
            0
        );
    }

    #[tokio::test]
    async fn test_publish_failure_skips_tick() {
        // No stream bound to kafka_state
        let provider = Arc::new(StreamProvider::from(InMemoryStreamService::new()));
        let producer = StateProducer::new(
            provider,
            Arc::new(FixtureStateSource::with_seed(3)),
            Duration::from_secs(10),
        );

        let outcome = producer.tick().await;
        assert!(matches!(
            outcome,
            TickOutcome::PublishFailed(PipelineError::Publish { .. })
        ));
        assert_eq!(producer.stats().snapshot().publish_failures, 1);
    }

    #[tokio::test]
    async fn test_run_ticks_on_interval_until_shutdown() {
        let provider = provisioned_provider().await;
        let producer = Arc::new(StateProducer::new(
            Arc::clone(&provider),
            Arc::new(FixtureStateSource::with_seed(9)),
            Duration::from_millis(100),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let runner = Arc::clone(&producer);
        let task = tokio::spawn(async move { runner.run(shutdown_rx).await });

        // Nothing before the first interval elapses
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(producer.stats().snapshot().ticks, 0);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while producer.stats().snapshot().published < 2 {
            assert!(tokio::time::Instant::now() < deadline, "producer did not tick");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown_tx.send(()).unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("producer did not stop")
            .unwrap();

        assert!(snapshot.published >= 2);
        assert_eq!(snapshot.fetch_failures, 0);
        assert_eq!(
            provider.as_in_memory().unwrap().pending_count(KAFKA_STATE_SUBJECT).await as u64,
            snapshot.published
        );
    }

    async fn run_until_ticks(producer: Arc<StateProducer>, ticks: u64) -> ProducerStatsSnapshot {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let runner = Arc::clone(&producer);
        let task = tokio::spawn(async move { runner.run(shutdown_rx).await });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while producer.stats().snapshot().ticks < ticks {
            assert!(tokio::time::Instant::now() < deadline, "producer stopped ticking");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("producer did not stop")
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_keeps_ticking_while_source_fails() {
        let provider = provisioned_provider().await;
        let producer = Arc::new(StateProducer::new(
            Arc::clone(&provider),
            Arc::new(FailingSource),
            Duration::from_millis(20),
        ));

        let snapshot = run_until_ticks(producer, 3).await;
        assert!(snapshot.ticks >= 3);
        assert_eq!(snapshot.fetch_failures, snapshot.ticks);
        assert_eq!(snapshot.published, 0);
        assert_eq!(
            provider.as_in_memory().unwrap().pending_count(KAFKA_STATE_SUBJECT).await,
            0
        );
    }

    #[tokio::test]
    async fn test_run_keeps_ticking_while_broker_rejects() {
        // No stream bound to kafka_state
        let provider = Arc::new(StreamProvider::from(InMemoryStreamService::new()));
        let producer = Arc::new(StateProducer::new(
            provider,
            Arc::new(FixtureStateSource::with_seed(5)),
            Duration::from_millis(20),
        ));

        let snapshot = run_until_ticks(producer, 3).await;
        assert!(snapshot.ticks >= 3);
        assert_eq!(snapshot.publish_failures, snapshot.ticks);
        assert_eq!(snapshot.fetch_failures, 0);
    }
}
