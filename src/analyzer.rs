//! # State Analyzer
//!
//! Classifies each [`StateRecord`] delivered on `kafka_state` and publishes the
//! resulting [`AnalysisVerdict`] on `analyzed_state`.
//!
//! Classification is a pure function of the record. The handler keeps no state
//! between messages, so a redelivered record yields an identical verdict.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::constants::{ANALYZED_STATE_SUBJECT, HEALTHY_VERDICT_MESSAGE};
use crate::error::{PipelineError, PipelineResult};
use crate::messaging::{DeliveredMessage, MessageHandler, StreamProvider};
use crate::models::{AnalysisVerdict, StateRecord, VerdictStatus};

/// Health predicate: healthy records are fine as they are, unhealthy ones carry
/// their own diagnostic forward
pub fn analyze(record: &StateRecord) -> AnalysisVerdict {
    if record.is_healthy {
        AnalysisVerdict::new(record.id, VerdictStatus::Ok, HEALTHY_VERDICT_MESSAGE)
    } else {
        AnalysisVerdict::new(record.id, VerdictStatus::Issue, record.message.clone())
    }
}

/// Subscription handler for `kafka_state`
///
/// A malformed payload fails with a decode error, which the subscription loop
/// logs and drops. A verdict that cannot be published is logged here and the
/// source record is still acknowledged.
#[derive(Debug)]
pub struct StateAnalyzer {
    provider: Arc<StreamProvider>,
    output_subject: String,
}

impl StateAnalyzer {
    pub fn new(provider: Arc<StreamProvider>) -> Self {
        Self::with_output_subject(provider, ANALYZED_STATE_SUBJECT)
    }

    pub fn with_output_subject(provider: Arc<StreamProvider>, subject: impl Into<String>) -> Self {
        Self {
            provider,
            output_subject: subject.into(),
        }
    }

    pub fn output_subject(&self) -> &str {
        &self.output_subject
    }

    /// Decode, classify and publish one payload
    ///
    /// Returns the verdict even when publishing it failed; the publish error is
    /// only reported.
    pub async fn process(
        &self,
        payload: &[u8],
    ) -> PipelineResult<(AnalysisVerdict, Option<PipelineError>)> {
        let record = StateRecord::from_payload(payload)?;
        let verdict = analyze(&record);
        let encoded = verdict.to_payload()?;

        match self.provider.publish(&self.output_subject, &encoded).await {
            Ok(ack) => {
                debug!(
                    verdict_id = verdict.id,
                    status = %verdict.status,
                    subject = %self.output_subject,
                    message_id = %ack.message_id,
                    "Published verdict"
                );
                Ok((verdict, None))
            }
            Err(e) => Ok((verdict, Some(PipelineError::publish(&self.output_subject, e)))),
        }
    }
}

#[async_trait]
impl MessageHandler for StateAnalyzer {
    async fn handle(&self, message: &DeliveredMessage) -> PipelineResult<()> {
        let (verdict, publish_error) = self.process(&message.payload).await?;

        if let Some(e) = publish_error {
            warn!(
                verdict_id = verdict.id,
                source_message_id = %message.message_id(),
                error = %e,
                "Failed to publish verdict, verdict dropped"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "state_analyzer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{streams, KAFKA_STATE_SUBJECT};
    use crate::messaging::InMemoryStreamService;
    use std::time::Duration;

    #[test]
    fn test_healthy_record_is_ok() {
        let record = StateRecord::new(1, "X", true, "anything");
        assert_eq!(
            analyze(&record),
            AnalysisVerdict::new(1, VerdictStatus::Ok, "ok no changes needed")
        );
    }

    #[test]
    fn test_unhealthy_record_keeps_diagnostic() {
        let message = "configuration issue need to change following configuration AAA";
        let record = StateRecord::new(21, "Y", false, message);
        assert_eq!(
            analyze(&record),
            AnalysisVerdict::new(21, VerdictStatus::Issue, message)
        );
    }

    async fn provisioned_provider() -> Arc<StreamProvider> {
        let provider = Arc::new(StreamProvider::from(InMemoryStreamService::new()));
        provider.ensure_stream(&streams::kafka_stream()).await.unwrap();
        provider.ensure_stream(&streams::analyzed_stream()).await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_process_publishes_verdict() {
        let provider = provisioned_provider().await;
        let analyzer = StateAnalyzer::new(Arc::clone(&provider));

        let payload = StateRecord::new(5, "Healthy State 9", true, "fine").to_payload().unwrap();
        let (verdict, publish_error) = analyzer.process(&payload).await.unwrap();
        assert!(publish_error.is_none());
        assert_eq!(verdict.status, VerdictStatus::Ok);

        let delivered = provider
            .fetch(ANALYZED_STATE_SUBJECT, 10, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(
            AnalysisVerdict::from_payload(&delivered[0].payload).unwrap(),
            verdict
        );
    }

    #[tokio::test]
    async fn test_record_without_message_is_still_classified() {
        let provider = provisioned_provider().await;
        let analyzer = StateAnalyzer::new(Arc::clone(&provider));

        let (verdict, _) = analyzer
            .process(br#"{"id":1,"name":"X","is_healthy":true}"#)
            .await
            .unwrap();
        assert_eq!(
            verdict,
            AnalysisVerdict::new(1, VerdictStatus::Ok, HEALTHY_VERDICT_MESSAGE)
        );

        let (verdict, _) = analyzer
            .process(br#"{"id":22,"name":null,"is_healthy":false,"message":null}"#)
            .await
            .unwrap();
        assert_eq!(verdict, AnalysisVerdict::new(22, VerdictStatus::Issue, ""));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_decode_error() {
        let provider = provisioned_provider().await;
        let analyzer = StateAnalyzer::new(Arc::clone(&provider));

        let result = analyzer.process(b"{\"id\": \"not a number\"").await;
        assert!(matches!(result, Err(PipelineError::Decode { .. })));
        assert_eq!(
            provider.as_in_memory().unwrap().pending_count(ANALYZED_STATE_SUBJECT).await,
            0
        );
    }

    #[tokio::test]
    async fn test_publish_failure_still_acknowledges_source() {
        let provider = Arc::new(StreamProvider::from(InMemoryStreamService::new()));
        provider.ensure_stream(&streams::kafka_stream()).await.unwrap();
        let analyzer = StateAnalyzer::new(Arc::clone(&provider));

        let payload = StateRecord::new(30, "Unhealthy State 20", false, "broken")
            .to_payload()
            .unwrap();
        provider.publish(KAFKA_STATE_SUBJECT, &payload).await.unwrap();
        let delivered = provider
            .fetch(KAFKA_STATE_SUBJECT, 1, Duration::from_secs(30))
            .await
            .unwrap();

        // analyzed_state has no stream, so the verdict cannot be published
        let (_, publish_error) = analyzer.process(&payload).await.unwrap();
        assert!(matches!(publish_error, Some(PipelineError::Publish { .. })));
        assert!(analyzer.handle(&delivered[0]).await.is_ok());
    }
}
