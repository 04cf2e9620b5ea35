//! # Pipeline Error Types
//!
//! Errors raised by the pipeline components. Broker failures are wrapped from
//! [`MessagingError`]; everything else is classified by what the component was
//! doing when it failed.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::{MessagingError, MessagingErrorCategory};

/// Errors raised by producer, analyzer, consumer and their collaborators
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stream could not be provisioned; fatal at startup
    #[error("Stream provisioning failed: {0}")]
    StreamProvision(MessagingError),

    #[error("Publish to {subject} failed: {source}")]
    Publish {
        subject: String,
        #[source]
        source: MessagingError,
    },

    #[error("Failed to decode {type_name}: {message}")]
    Decode { type_name: String, message: String },

    #[error("Failed to encode {type_name}: {message}")]
    Encode { type_name: String, message: String },

    #[error("State source {endpoint} failed: {message}")]
    StateFetch { endpoint: String, message: String },

    #[error("Sink delivery to {endpoint} failed: {message}")]
    SinkDelivery { endpoint: String, message: String },

    #[error("Broker error: {0}")]
    Broker(MessagingError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl PipelineError {
    pub fn publish(subject: impl Into<String>, source: MessagingError) -> Self {
        Self::Publish {
            subject: subject.into(),
            source,
        }
    }

    pub fn decode(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn encode(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn state_fetch(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StateFetch {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn sink_delivery(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkDelivery {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Whether a later attempt at the same unit of work could succeed
    ///
    /// Malformed payloads and bad configuration never heal on redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Publish { .. } | Self::StateFetch { .. } | Self::SinkDelivery { .. } | Self::Broker(_)
        )
    }

    /// Whether the owning process cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StreamProvision(_) | Self::Configuration(_))
    }

    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StreamProvision(_) => "stream_provision",
            Self::Publish { .. } => "publish",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::StateFetch { .. } => "state_fetch",
            Self::SinkDelivery { .. } => "sink_delivery",
            Self::Broker(_) => "broker",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<MessagingError> for PipelineError {
    fn from(error: MessagingError) -> Self {
        match error.category() {
            MessagingErrorCategory::StreamProvision => Self::StreamProvision(error),
            _ => Self::Broker(error),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
