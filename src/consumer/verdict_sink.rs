//! # Verdict Sinks
//!
//! Destinations for analysis verdicts. One call per verdict, no batching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use crate::config::ConfigurationError;
use crate::error::{PipelineError, PipelineResult};
use crate::models::AnalysisVerdict;

#[async_trait]
pub trait VerdictSink: Send + Sync + 'static {
    async fn deliver(&self, verdict: &AnalysisVerdict) -> PipelineResult<()>;

    fn describe(&self) -> String;
}

/// Posts each verdict as JSON to `result_url`; anything but `200 OK` is a failure
#[derive(Debug, Clone)]
pub struct HttpVerdictSink {
    client: Client,
    result_url: String,
}

impl HttpVerdictSink {
    pub fn new(result_url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let result_url = result_url.into();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("statewatch/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConfigurationError::invalid_value(
                    "sink.result_url",
                    result_url.clone(),
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self { client, result_url })
    }

    pub fn result_url(&self) -> &str {
        &self.result_url
    }
}

#[async_trait]
impl VerdictSink for HttpVerdictSink {
    async fn deliver(&self, verdict: &AnalysisVerdict) -> PipelineResult<()> {
        debug!(verdict_id = verdict.id, "Posting verdict to: {}", self.result_url);

        let response = self
            .client
            .post(&self.result_url)
            .json(verdict)
            .send()
            .await
            .map_err(|e| {
                PipelineError::sink_delivery(&self.result_url, format!("Request failed: {e}"))
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(PipelineError::sink_delivery(
                &self.result_url,
                format!("Unexpected status {status}: {error_text}"),
            ))
        }
    }

    fn describe(&self) -> String {
        self.result_url.clone()
    }
}

/// Writes verdicts to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingVerdictSink;

#[async_trait]
impl VerdictSink for LoggingVerdictSink {
    async fn deliver(&self, verdict: &AnalysisVerdict) -> PipelineResult<()> {
        info!(
            verdict_id = verdict.id,
            status = %verdict.status,
            message = %verdict.message,
            "Verdict received"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        "log".to_string()
    }
}
