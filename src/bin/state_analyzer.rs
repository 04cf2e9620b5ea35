//! # State Analyzer
//!
//! Classifies every state on `kafka_state` and publishes the verdict on
//! `analyzed_state`.
//!
//! ## Usage
//!
//! ```bash
//! STATEWATCH_BROKER_URL=postgresql://localhost:5432/statewatch cargo run --bin state-analyzer
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{error, info};

use statewatch::analyzer::StateAnalyzer;
use statewatch::bootstrap;
use statewatch::constants::KAFKA_STATE_SUBJECT;
use statewatch::logging;
use statewatch::messaging::{StreamSubscriber, SubscriberConfig};
use statewatch::ConfigLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    info!("🚀 Starting State Analyzer...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::load_from_env().context("Failed to load configuration")?;

    let provider = bootstrap::connect_provider(&config.broker)
        .await
        .context("Failed to connect to broker")?;
    bootstrap::ensure_streams(&provider, &bootstrap::analyzer_streams())
        .await
        .context("Failed to provision streams")?;

    let subscriber = StreamSubscriber::new(
        Arc::clone(&provider),
        SubscriberConfig::from(&config.subscription),
    );
    let analyzer = Arc::new(StateAnalyzer::new(provider));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = subscriber.subscribe(KAFKA_STATE_SUBJECT, analyzer, shutdown_rx);

    info!("   Press Ctrl+C to shutdown gracefully");
    bootstrap::shutdown_signal().await;

    info!("🛑 Shutdown signal received, stopping subscription...");
    let _ = shutdown_tx.send(());
    match handle.join().await {
        Ok(stats) => info!(
            received = stats.messages_received,
            handled_ok = stats.handled_ok,
            dropped = stats.dropped,
            "✅ State analyzer stopped"
        ),
        Err(e) => error!("State analyzer subscription failed: {}", e),
    }

    info!("👋 State Analyzer shutdown complete");
    Ok(())
}
