//! # Configuration
//!
//! Pipeline configuration loaded from an optional TOML file with environment
//! substitution, then validated with the `validator` crate.
//!
//! ```toml
//! [broker]
//! backend = "pgmq"
//! url = "${DATABASE_URL:-postgresql://localhost:5432/statewatch}"
//!
//! [producer]
//! interval_ms = 10000
//! state_url = "http://localhost:8080/state"
//!
//! [subscription]
//! batch_size = 10
//! ack_wait_seconds = 30
//!
//! [sink]
//! result_url = "http://localhost:8080/result"
//! ```
//!
//! Every section and field is optional; missing values take the defaults below.

pub mod error;
pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::{
    DEFAULT_BROKER_URL, DEFAULT_PRODUCER_INTERVAL_MS, DEFAULT_RESULT_URL, DEFAULT_STATE_URL,
};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration shared by all pipeline processes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "snake_case")]
pub struct StatewatchConfig {
    #[validate(nested)]
    pub broker: BrokerConfig,

    #[validate(nested)]
    pub producer: ProducerConfig,

    #[validate(nested)]
    pub subscription: SubscriptionConfig,

    #[validate(nested)]
    pub sink: SinkConfig,
}

/// Which stream backend to connect to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerBackend {
    #[default]
    Pgmq,
    InMemory,
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "snake_case")]
pub struct BrokerConfig {
    pub backend: BrokerBackend,

    /// Broker address
    #[validate(length(min = 1))]
    pub url: String,

    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,

    #[validate(range(min = 100, max = 300000))]
    pub connect_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::Pgmq,
            url: DEFAULT_BROKER_URL.to_string(),
            max_connections: 5,
            connect_timeout_ms: 5000,
        }
    }
}

impl BrokerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Where the producer samples state from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSourceKind {
    #[default]
    Http,
    /// Built-in catalog of predefined states, picked at random
    Fixture,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "snake_case")]
pub struct ProducerConfig {
    /// Sampling interval
    #[validate(range(min = 1))]
    pub interval_ms: u64,

    pub source: StateSourceKind,

    #[validate(url)]
    pub state_url: String,

    #[validate(range(min = 1, max = 300000))]
    pub request_timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_PRODUCER_INTERVAL_MS,
            source: StateSourceKind::Http,
            state_url: DEFAULT_STATE_URL.to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl ProducerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// What a subscription does with a message whose handler failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Acknowledge and log; the message is gone
    #[default]
    Drop,
    /// Return retryable failures to the stream; drop the rest
    RedeliverTransient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "snake_case")]
pub struct SubscriptionConfig {
    #[validate(range(min = 1, max = 100))]
    pub batch_size: u32,

    /// Redelivery deadline for unacknowledged messages
    #[validate(range(min = 1, max = 43200))]
    pub ack_wait_seconds: u64,

    #[validate(range(min = 1, max = 60000))]
    pub poll_interval_ms: u64,

    pub failure_policy: FailurePolicy,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            ack_wait_seconds: 30,
            poll_interval_ms: 500,
            failure_policy: FailurePolicy::Drop,
        }
    }
}

/// Where verdicts are delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Http,
    /// Write verdicts to the log only
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "snake_case")]
pub struct SinkConfig {
    pub kind: SinkKind,

    #[validate(url)]
    pub result_url: String,

    #[validate(range(min = 1, max = 300000))]
    pub request_timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Http,
            result_url: DEFAULT_RESULT_URL.to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl SinkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StatewatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broker.url, DEFAULT_BROKER_URL);
        assert_eq!(config.producer.interval(), Duration::from_secs(10));
        assert_eq!(config.subscription.failure_policy, FailurePolicy::Drop);
        assert_eq!(config.sink.result_url, "http://localhost:8080/result");
    }

    #[test]
    fn test_out_of_range_values_fail_validation() {
        let mut config = StatewatchConfig::default();
        config.subscription.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = StatewatchConfig::default();
        config.sink.result_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enums_use_snake_case() {
        assert_eq!(
            serde_json::to_value(FailurePolicy::RedeliverTransient).unwrap(),
            serde_json::json!("redeliver_transient")
        );
        assert_eq!(
            serde_json::to_value(BrokerBackend::InMemory).unwrap(),
            serde_json::json!("in_memory")
        );
    }
}
