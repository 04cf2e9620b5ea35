//! # Verdict Consumer
//!
//! Forwards each verdict delivered on `analyzed_state` to a [`VerdictSink`].
//! Decode and delivery failures are returned to the subscription loop, which
//! logs them and acknowledges the message so a failing sink never causes a
//! redelivery storm.

pub mod verdict_sink;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::PipelineResult;
use crate::messaging::{DeliveredMessage, MessageHandler};
use crate::models::AnalysisVerdict;

pub use verdict_sink::{HttpVerdictSink, LoggingVerdictSink, VerdictSink};

/// Subscription handler for `analyzed_state`
pub struct VerdictConsumer {
    sink: Arc<dyn VerdictSink>,
}

impl std::fmt::Debug for VerdictConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerdictConsumer")
            .field("sink", &self.sink.describe())
            .finish()
    }
}

impl VerdictConsumer {
    pub fn new(sink: Arc<dyn VerdictSink>) -> Self {
        Self { sink }
    }

    /// Decode one payload and deliver it to the sink
    pub async fn process(&self, payload: &[u8]) -> PipelineResult<AnalysisVerdict> {
        let verdict = AnalysisVerdict::from_payload(payload)?;
        self.sink.deliver(&verdict).await?;
        Ok(verdict)
    }
}

#[async_trait]
impl MessageHandler for VerdictConsumer {
    async fn handle(&self, message: &DeliveredMessage) -> PipelineResult<()> {
        let verdict = self.process(&message.payload).await?;
        debug!(
            verdict_id = verdict.id,
            status = %verdict.status,
            sink = %self.sink.describe(),
            "Verdict delivered"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "verdict_consumer"
    }
}
