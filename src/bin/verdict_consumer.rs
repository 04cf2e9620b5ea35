//! # Verdict Consumer
//!
//! Delivers every verdict on `analyzed_state` to the configured sink.
//!
//! ## Usage
//!
//! ```bash
//! STATEWATCH_BROKER_URL=postgresql://localhost:5432/statewatch cargo run --bin verdict-consumer
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{error, info};

use statewatch::bootstrap;
use statewatch::constants::ANALYZED_STATE_SUBJECT;
use statewatch::consumer::VerdictConsumer;
use statewatch::logging;
use statewatch::messaging::{StreamSubscriber, SubscriberConfig};
use statewatch::ConfigLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    info!("🚀 Starting Verdict Consumer...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::load_from_env().context("Failed to load configuration")?;

    let provider = bootstrap::connect_provider(&config.broker)
        .await
        .context("Failed to connect to broker")?;
    bootstrap::ensure_streams(&provider, &bootstrap::consumer_streams())
        .await
        .context("Failed to provision streams")?;

    let sink = bootstrap::build_verdict_sink(&config.sink).context("Failed to build verdict sink")?;
    info!("   Sink: {}", sink.describe());

    let subscriber = StreamSubscriber::new(provider, SubscriberConfig::from(&config.subscription));
    let consumer = Arc::new(VerdictConsumer::new(sink));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = subscriber.subscribe(ANALYZED_STATE_SUBJECT, consumer, shutdown_rx);

    info!("   Press Ctrl+C to shutdown gracefully");
    bootstrap::shutdown_signal().await;

    info!("🛑 Shutdown signal received, stopping subscription...");
    let _ = shutdown_tx.send(());
    match handle.join().await {
        Ok(stats) => info!(
            received = stats.messages_received,
            delivered = stats.handled_ok,
            dropped = stats.dropped,
            "✅ Verdict consumer stopped"
        ),
        Err(e) => error!("Verdict consumer subscription failed: {}", e),
    }

    info!("👋 Verdict Consumer shutdown complete");
    Ok(())
}
