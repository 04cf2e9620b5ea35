#![allow(dead_code)]

pub mod strategies;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use statewatch::consumer::VerdictSink;
use statewatch::messaging::{InMemoryStreamService, StreamProvider};
use statewatch::{AnalysisVerdict, PipelineResult};

/// Fresh in-memory broker with both pipeline streams provisioned
pub async fn in_memory_pipeline_provider() -> Arc<StreamProvider> {
    let provider = Arc::new(StreamProvider::from(InMemoryStreamService::new()));
    statewatch::bootstrap::ensure_streams(&provider, &statewatch::bootstrap::analyzer_streams())
        .await
        .unwrap();
    provider
}

/// Poll `condition` every 10ms until it holds, panicking after `timeout`
pub async fn wait_until<F>(timeout: Duration, what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Sink that records every verdict it is handed
#[derive(Debug, Default)]
pub struct CollectingSink {
    delivered: Mutex<Vec<AnalysisVerdict>>,
}

impl CollectingSink {
    pub fn delivered(&self) -> Vec<AnalysisVerdict> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl VerdictSink for CollectingSink {
    async fn deliver(&self, verdict: &AnalysisVerdict) -> PipelineResult<()> {
        self.delivered.lock().unwrap().push(verdict.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "collecting".to_string()
    }
}

/// Generate a unique, pgmq-safe name for test streams and subjects
pub fn unique_name(prefix: &str) -> String {
    let random: u32 = fastrand::u32(..);
    format!("{prefix}_{random:08x}")
}
