//! # Messaging Error Types
//!
//! Structured broker errors using thiserror instead of `Box<dyn Error>` patterns.

use thiserror::Error;

/// Broker-layer errors shared by every stream provider
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    #[error("Stream provisioning failed: {stream}: {message}")]
    StreamProvision { stream: String, message: String },

    #[error("Stream not found: {stream}")]
    StreamNotFound { stream: String },

    #[error("Subject is not bound to any stream: {subject}")]
    SubjectNotBound { subject: String },

    #[error("Invalid subject: {subject}: {reason}")]
    InvalidSubject { subject: String, reason: String },

    #[error("Publish failed: {subject}: {message}")]
    Publish { subject: String, message: String },

    #[error("Fetch failed: {subject}: {message}")]
    Fetch { subject: String, message: String },

    #[error("Acknowledgement failed: {subject}: {operation}: {message}")]
    Acknowledge {
        subject: String,
        operation: String,
        message: String,
    },

    #[error("Message not found: {subject}: {message_id}")]
    MessageNotFound { subject: String, message_id: String },

    #[error("Message serialization error: {message}")]
    Serialization { message: String },

    #[error("Stream statistics unavailable: {stream}: {message}")]
    Stats { stream: String, message: String },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

/// Coarse classification used by the pipeline error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingErrorCategory {
    StreamProvision,
    Publish,
    Delivery,
    Broker,
}

impl MessagingError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn stream_provision(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StreamProvision {
            stream: stream.into(),
            message: message.into(),
        }
    }

    pub fn stream_not_found(stream: impl Into<String>) -> Self {
        Self::StreamNotFound {
            stream: stream.into(),
        }
    }

    pub fn subject_not_bound(subject: impl Into<String>) -> Self {
        Self::SubjectNotBound {
            subject: subject.into(),
        }
    }

    pub fn invalid_subject(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSubject {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn publish(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn fetch(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn acknowledge(
        subject: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Acknowledge {
            subject: subject.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn message_not_found(subject: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::MessageNotFound {
            subject: subject.into(),
            message_id: message_id.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn stats(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stats {
            stream: stream.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map the error onto the pipeline taxonomy
    pub fn category(&self) -> MessagingErrorCategory {
        match self {
            Self::StreamProvision { .. } | Self::InvalidSubject { .. } => {
                MessagingErrorCategory::StreamProvision
            }
            Self::Publish { .. } | Self::SubjectNotBound { .. } | Self::Serialization { .. } => {
                MessagingErrorCategory::Publish
            }
            Self::Fetch { .. }
            | Self::Acknowledge { .. }
            | Self::MessageNotFound { .. } => MessagingErrorCategory::Delivery,
            Self::Connection { .. }
            | Self::StreamNotFound { .. }
            | Self::Stats { .. }
            | Self::Internal { .. } => MessagingErrorCategory::Broker,
        }
    }
}

impl From<sqlx::Error> for MessagingError {
    fn from(error: sqlx::Error) -> Self {
        Self::connection(error.to_string())
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string())
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
