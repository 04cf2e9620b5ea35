//! # Process Bootstrap
//!
//! Startup steps shared by the pipeline binaries: connect the configured stream
//! provider, provision the streams the process owns, build its source or sink,
//! and wait for a shutdown signal. Connection and provisioning failures are
//! fatal and returned to `main`.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use crate::config::{
    BrokerBackend, BrokerConfig, ProducerConfig, SinkConfig, SinkKind, StateSourceKind,
};
use crate::constants::streams;
use crate::consumer::{HttpVerdictSink, LoggingVerdictSink, VerdictSink};
use crate::error::{PipelineError, PipelineResult};
use crate::messaging::{InMemoryStreamService, PgmqStreamService, StreamConfig, StreamProvider};
use crate::producer::{FixtureStateSource, HttpStateSource, StateSource};

/// Streams the producer publishes to
pub fn producer_streams() -> Vec<StreamConfig> {
    vec![streams::kafka_stream()]
}

/// Input and output streams of the analyzer
pub fn analyzer_streams() -> Vec<StreamConfig> {
    vec![streams::kafka_stream(), streams::analyzed_stream()]
}

/// Streams the verdict consumer reads from
pub fn consumer_streams() -> Vec<StreamConfig> {
    vec![streams::analyzed_stream()]
}

/// Connect the configured broker backend
pub async fn connect_provider(config: &BrokerConfig) -> PipelineResult<Arc<StreamProvider>> {
    let provider = match config.backend {
        BrokerBackend::InMemory => {
            info!("Using in-memory stream provider; messages do not outlive this process");
            StreamProvider::from(InMemoryStreamService::new())
        }
        BrokerBackend::Pgmq => {
            info!(
                max_connections = config.max_connections,
                "🔧 Connecting to pgmq broker"
            );
            let service = PgmqStreamService::connect(
                &config.url,
                config.max_connections,
                config.connect_timeout(),
            )
            .await
            .map_err(PipelineError::Broker)?;
            StreamProvider::from(service)
        }
    };

    info!(provider = provider.provider_name(), "✅ Stream provider connected");
    Ok(Arc::new(provider))
}

/// Provision every stream the process depends on
///
/// Any failure, including an unreachable broker, is a stream provisioning error.
pub async fn ensure_streams(
    provider: &StreamProvider,
    stream_configs: &[StreamConfig],
) -> PipelineResult<()> {
    for config in stream_configs {
        provider
            .ensure_stream(config)
            .await
            .map_err(PipelineError::StreamProvision)?;
    }
    Ok(())
}

/// Build the state source selected by configuration
pub fn build_state_source(config: &ProducerConfig) -> PipelineResult<Arc<dyn StateSource>> {
    Ok(match config.source {
        StateSourceKind::Http => Arc::new(HttpStateSource::new(
            config.state_url.clone(),
            config.request_timeout(),
        )?),
        StateSourceKind::Fixture => Arc::new(FixtureStateSource::new()),
    })
}

/// Build the verdict sink selected by configuration
pub fn build_verdict_sink(config: &SinkConfig) -> PipelineResult<Arc<dyn VerdictSink>> {
    Ok(match config.kind {
        SinkKind::Http => Arc::new(HttpVerdictSink::new(
            config.result_url.clone(),
            config.request_timeout(),
        )?),
        SinkKind::Log => Arc::new(LoggingVerdictSink),
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
