//! # State Sources
//!
//! Where the producer samples [`StateRecord`]s from. The HTTP source talks to the
//! monitored system's state endpoint; the fixture source draws from a built-in
//! catalog so the pipeline can run without any external endpoint.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::ConfigurationError;
use crate::constants::HEALTHY_VERDICT_MESSAGE;
use crate::error::{PipelineError, PipelineResult};
use crate::models::StateRecord;

/// Supplies one state sample per call
#[async_trait]
pub trait StateSource: Send + Sync + 'static {
    async fn fetch_state(&self) -> PipelineResult<StateRecord>;

    /// Label used in log fields
    fn describe(&self) -> String;
}

/// Fetches samples with `GET <state_url>`
#[derive(Debug, Clone)]
pub struct HttpStateSource {
    client: Client,
    state_url: String,
}

impl HttpStateSource {
    pub fn new(state_url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let state_url = state_url.into();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("statewatch/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConfigurationError::invalid_value(
                    "producer.state_url",
                    state_url.clone(),
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self { client, state_url })
    }

    pub fn state_url(&self) -> &str {
        &self.state_url
    }
}

#[async_trait]
impl StateSource for HttpStateSource {
    async fn fetch_state(&self) -> PipelineResult<StateRecord> {
        debug!("Fetching state from: {}", self.state_url);

        let response = self
            .client
            .get(&self.state_url)
            .send()
            .await
            .map_err(|e| {
                PipelineError::state_fetch(&self.state_url, format!("Request failed: {e}"))
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::state_fetch(
                &self.state_url,
                format!("Unexpected status {status}: {error_text}"),
            ));
        }

        response.json::<StateRecord>().await.map_err(|e| {
            PipelineError::state_fetch(&self.state_url, format!("Failed to parse response: {e}"))
        })
    }

    fn describe(&self) -> String {
        self.state_url.clone()
    }
}

/// Diagnostic codes carried by the unhealthy catalog entries, ids 21 to 50
const UNHEALTHY_CODES: [&str; 30] = [
    "AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "GGG", "HHH", "LLL", "MMM", "NNN", "OOO", "PPP",
    "YYY", "TTT", "WWW", "QQQ", "AAA2", "AAA3", "BBB2", "BBB3", "ZZZ", "VVV", "XXX", "ZZZ7",
    "RRR9", "UUU3", "ABC8", "SSS1", "ASW",
];

const HEALTHY_STATE_COUNT: i64 = 20;

/// Draws uniformly at random from a predefined catalog of 50 states
///
/// Ids 1-20 are healthy; ids 21-50 report a configuration issue.
#[derive(Debug)]
pub struct FixtureStateSource {
    catalog: Vec<StateRecord>,
    rng: Mutex<fastrand::Rng>,
}

impl Default for FixtureStateSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureStateSource {
    pub fn new() -> Self {
        Self::from_rng(fastrand::Rng::new())
    }

    /// Deterministic sequence for tests
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(fastrand::Rng::with_seed(seed))
    }

    fn from_rng(rng: fastrand::Rng) -> Self {
        Self {
            catalog: Self::default_catalog(),
            rng: Mutex::new(rng),
        }
    }

    pub fn catalog(&self) -> &[StateRecord] {
        &self.catalog
    }

    /// The predefined states served by the mock state endpoint
    pub fn default_catalog() -> Vec<StateRecord> {
        let healthy = (1..=HEALTHY_STATE_COUNT).map(|id| {
            StateRecord::new(
                id,
                format!("Healthy State {}", id * 2 - 1),
                true,
                HEALTHY_VERDICT_MESSAGE,
            )
        });

        let unhealthy = UNHEALTHY_CODES.iter().zip(1i64..).map(|(code, n)| {
            StateRecord::new(
                HEALTHY_STATE_COUNT + n,
                format!("Unhealthy State {}", n * 2),
                false,
                format!("configuration issue need to change following configuration {code}"),
            )
        });

        healthy.chain(unhealthy).collect()
    }
}

#[async_trait]
impl StateSource for FixtureStateSource {
    async fn fetch_state(&self) -> PipelineResult<StateRecord> {
        let index = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| PipelineError::state_fetch("fixture", "random source poisoned"))?;
            rng.usize(..self.catalog.len())
        };

        Ok(self.catalog[index].clone())
    }

    fn describe(&self) -> String {
        "fixture".to_string()
    }
}
