#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Statewatch
//!
//! A three-stage state monitoring pipeline connected by durable streams.
//!
//! ## Overview
//!
//! ```text
//! state source --> [producer] --kafka_state--> [analyzer] --analyzed_state--> [consumer] --> sink
//!                              (KAFKA_STREAM)              (ANALYZED_STREAM)
//! ```
//!
//! - The **producer** samples a [`StateRecord`] on a fixed interval and publishes it
//! - The **analyzer** turns each record into an [`AnalysisVerdict`]
//! - The **consumer** forwards each verdict to the sink, one request per verdict
//!
//! Each stage runs as its own process and only talks to the others through the
//! broker. Delivery is at-least-once: a message is acknowledged once its handler
//! finishes, and unacknowledged messages are delivered again after the ack deadline.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Stream service, pgmq and in-memory providers, subscription loop
//! - [`models`] - Wire records exchanged between stages
//! - [`producer`] - Periodic state sampling and publishing
//! - [`analyzer`] - Health classification
//! - [`consumer`] - Verdict delivery
//! - [`bootstrap`] - Provider connection and stream provisioning for the binaries
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use statewatch::analyzer::StateAnalyzer;
//! use statewatch::constants::KAFKA_STATE_SUBJECT;
//! use statewatch::messaging::{InMemoryStreamService, StreamProvider, StreamSubscriber, SubscriberConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(StreamProvider::from(InMemoryStreamService::new()));
//! statewatch::bootstrap::ensure_streams(&provider, &statewatch::bootstrap::analyzer_streams()).await?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//! let subscriber = StreamSubscriber::new(Arc::clone(&provider), SubscriberConfig::default());
//! let analyzer = Arc::new(StateAnalyzer::new(Arc::clone(&provider)));
//! let handle = subscriber.subscribe(KAFKA_STATE_SUBJECT, analyzer, shutdown_rx);
//! # drop(handle);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod producer;
pub mod utils;

pub use config::{ConfigLoader, StatewatchConfig};
pub use error::{PipelineError, PipelineResult};
pub use models::{AnalysisVerdict, StateRecord, VerdictStatus};
