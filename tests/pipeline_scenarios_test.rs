//! End-to-end pipeline scenarios on the in-memory broker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use common::{in_memory_pipeline_provider, wait_until, CollectingSink};
use statewatch::analyzer::{analyze, StateAnalyzer};
use statewatch::config::FailurePolicy;
use statewatch::constants::{ANALYZED_STATE_SUBJECT, KAFKA_STATE_SUBJECT};
use statewatch::consumer::{HttpVerdictSink, VerdictConsumer, VerdictSink};
use statewatch::messaging::{
    StreamProvider, StreamSubscriber, SubscriberConfig, SubscriptionHandle,
};
use statewatch::producer::{FixtureStateSource, StateProducer};
use statewatch::{AnalysisVerdict, StateRecord, VerdictStatus};

const WAIT: Duration = Duration::from_secs(5);

fn fast_subscriber(provider: &Arc<StreamProvider>) -> StreamSubscriber {
    StreamSubscriber::new(
        Arc::clone(provider),
        SubscriberConfig {
            batch_size: 10,
            ack_wait: Duration::from_secs(30),
            poll_interval: Duration::from_millis(10),
            failure_policy: FailurePolicy::Drop,
        },
    )
}

struct RunningPipeline {
    shutdown_tx: broadcast::Sender<()>,
    analyzer: SubscriptionHandle,
    consumer: SubscriptionHandle,
    sink: Arc<CollectingSink>,
}

impl RunningPipeline {
    fn start(provider: &Arc<StreamProvider>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let sink = Arc::new(CollectingSink::default());
        let subscriber = fast_subscriber(provider);

        let analyzer = subscriber.subscribe(
            KAFKA_STATE_SUBJECT,
            Arc::new(StateAnalyzer::new(Arc::clone(provider))),
            shutdown_tx.subscribe(),
        );
        let consumer = subscriber.subscribe(
            ANALYZED_STATE_SUBJECT,
            Arc::new(VerdictConsumer::new(Arc::clone(&sink) as Arc<dyn VerdictSink>)),
            shutdown_tx.subscribe(),
        );

        Self {
            shutdown_tx,
            analyzer,
            consumer,
            sink,
        }
    }

    async fn stop(self) {
        self.shutdown_tx.send(()).unwrap();
        tokio::time::timeout(WAIT, self.analyzer.join())
            .await
            .expect("analyzer did not stop")
            .unwrap();
        tokio::time::timeout(WAIT, self.consumer.join())
            .await
            .expect("consumer did not stop")
            .unwrap();
    }
}

async fn publish_state(provider: &StreamProvider, record: &StateRecord) {
    provider
        .publish(KAFKA_STATE_SUBJECT, &record.to_payload().unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_healthy_state_yields_ok_verdict() {
    let provider = in_memory_pipeline_provider().await;
    let pipeline = RunningPipeline::start(&provider);

    publish_state(&provider, &StateRecord::new(1, "X", true, "anything")).await;

    let sink = Arc::clone(&pipeline.sink);
    wait_until(WAIT, "ok verdict", || sink.delivered().len() == 1).await;
    assert_eq!(
        sink.delivered(),
        vec![AnalysisVerdict::new(1, VerdictStatus::Ok, "ok no changes needed")]
    );

    pipeline.stop().await;
}

#[tokio::test]
async fn test_unhealthy_state_yields_issue_verdict() {
    let provider = in_memory_pipeline_provider().await;
    let pipeline = RunningPipeline::start(&provider);

    let diagnostic = "configuration issue need to change following configuration AAA";
    publish_state(&provider, &StateRecord::new(21, "Y", false, diagnostic)).await;

    let sink = Arc::clone(&pipeline.sink);
    wait_until(WAIT, "issue verdict", || sink.delivered().len() == 1).await;
    assert_eq!(
        sink.delivered(),
        vec![AnalysisVerdict::new(21, VerdictStatus::Issue, diagnostic)]
    );

    pipeline.stop().await;
}

#[tokio::test]
async fn test_malformed_state_is_dropped_and_stream_continues() {
    let provider = in_memory_pipeline_provider().await;
    let pipeline = RunningPipeline::start(&provider);

    provider
        .publish(KAFKA_STATE_SUBJECT, b"\xff\xfe not json at all")
        .await
        .unwrap();
    publish_state(&provider, &StateRecord::new(2, "Healthy State 3", true, "fine")).await;

    let sink = Arc::clone(&pipeline.sink);
    wait_until(WAIT, "verdict after malformed payload", || {
        sink.delivered().len() == 1
    })
    .await;

    let analyzer_stats = pipeline.analyzer.stats().snapshot();
    assert_eq!(analyzer_stats.messages_received, 2);
    assert_eq!(analyzer_stats.dropped, 1);
    assert_eq!(analyzer_stats.handled_ok, 1);

    // Give a stray verdict time to show up before asserting on the sink
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.delivered()[0].id, 2);
    assert_eq!(sink.delivered().len(), 1);

    let in_memory = provider.as_in_memory().unwrap();
    assert_eq!(in_memory.pending_count(KAFKA_STATE_SUBJECT).await, 0);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_unreachable_sink_acknowledges_and_continues() {
    let provider = in_memory_pipeline_provider().await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let sink = HttpVerdictSink::new("http://127.0.0.1:1/result", Duration::from_millis(500)).unwrap();
    let handle = fast_subscriber(&provider).subscribe(
        ANALYZED_STATE_SUBJECT,
        Arc::new(VerdictConsumer::new(Arc::new(sink))),
        shutdown_rx,
    );

    for id in [1, 2] {
        let verdict = AnalysisVerdict::new(id, VerdictStatus::Ok, "ok no changes needed");
        provider
            .publish(ANALYZED_STATE_SUBJECT, &verdict.to_payload().unwrap())
            .await
            .unwrap();
    }

    wait_until(WAIT, "both deliveries attempted", || {
        handle.stats().snapshot().messages_received == 2
    })
    .await;
    wait_until(WAIT, "both verdicts dropped", || {
        handle.stats().snapshot().dropped == 2
    })
    .await;

    let in_memory = provider.as_in_memory().unwrap();
    assert_eq!(in_memory.pending_count(ANALYZED_STATE_SUBJECT).await, 0);
    assert!(!handle.is_finished());

    shutdown_tx.send(()).unwrap();
    let stats = tokio::time::timeout(WAIT, handle.join())
        .await
        .expect("consumer did not stop")
        .unwrap();
    assert_eq!(stats.requeued, 0);
    assert_eq!(stats.handled_ok, 0);
}

#[tokio::test]
async fn test_redelivered_state_yields_equal_verdicts() {
    let provider = in_memory_pipeline_provider().await;
    let pipeline = RunningPipeline::start(&provider);

    let record = StateRecord::new(33, "Unhealthy State 26", false, "configuration issue PPP");
    publish_state(&provider, &record).await;
    publish_state(&provider, &record).await;

    let sink = Arc::clone(&pipeline.sink);
    wait_until(WAIT, "two verdicts", || sink.delivered().len() == 2).await;
    let delivered = sink.delivered();
    assert_eq!(delivered[0], delivered[1]);
    assert_eq!(delivered[0], analyze(&record));

    pipeline.stop().await;
}

#[tokio::test]
async fn test_unacknowledged_state_is_redelivered_after_ack_wait() {
    let provider = in_memory_pipeline_provider().await;
    let record = StateRecord::new(4, "Healthy State 7", true, "fine");
    publish_state(&provider, &record).await;

    // A subscriber that fetched the message and died before acknowledging it
    let abandoned = provider
        .fetch(KAFKA_STATE_SUBJECT, 10, Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(abandoned.len(), 1);

    let pipeline = RunningPipeline::start(&provider);
    let sink = Arc::clone(&pipeline.sink);
    wait_until(WAIT, "redelivered verdict", || sink.delivered().len() == 1).await;
    assert_eq!(sink.delivered()[0], analyze(&record));

    pipeline.stop().await;
}

#[tokio::test]
async fn test_full_pipeline_from_fixture_source() {
    let provider = in_memory_pipeline_provider().await;
    let pipeline = RunningPipeline::start(&provider);

    let source = Arc::new(FixtureStateSource::with_seed(2024));
    let catalog = source.catalog().to_vec();
    let producer = Arc::new(StateProducer::new(
        Arc::clone(&provider),
        source,
        Duration::from_millis(20),
    ));
    let runner = Arc::clone(&producer);
    let producer_task = tokio::spawn({
        let shutdown_rx = pipeline.shutdown_tx.subscribe();
        async move { runner.run(shutdown_rx).await }
    });

    let sink = Arc::clone(&pipeline.sink);
    wait_until(WAIT, "five verdicts", || sink.delivered().len() >= 5).await;

    for verdict in sink.delivered() {
        let record = catalog
            .iter()
            .find(|r| r.id == verdict.id)
            .expect("verdict for unknown state");
        assert_eq!(verdict, analyze(record));
    }

    pipeline.stop().await;
    let producer_stats = tokio::time::timeout(WAIT, producer_task)
        .await
        .expect("producer did not stop")
        .unwrap();
    assert!(producer_stats.published >= 5);
    assert_eq!(producer_stats.publish_failures, 0);
}
