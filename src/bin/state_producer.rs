//! # State Producer
//!
//! Samples the monitored system every `producer.interval_ms` and publishes each
//! sample on `kafka_state`.
//!
//! ## Usage
//!
//! ```bash
//! # Durable broker
//! STATEWATCH_BROKER_URL=postgresql://localhost:5432/statewatch cargo run --bin state-producer
//!
//! # With a configuration file
//! STATEWATCH_CONFIG_PATH=config/statewatch.toml cargo run --bin state-producer
//! ```

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{error, info};

use statewatch::bootstrap;
use statewatch::logging;
use statewatch::producer::StateProducer;
use statewatch::ConfigLoader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    info!("🚀 Starting State Producer...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::load_from_env().context("Failed to load configuration")?;

    let provider = bootstrap::connect_provider(&config.broker)
        .await
        .context("Failed to connect to broker")?;
    bootstrap::ensure_streams(&provider, &bootstrap::producer_streams())
        .await
        .context("Failed to provision streams")?;

    let source = bootstrap::build_state_source(&config.producer)
        .context("Failed to build state source")?;
    let producer = StateProducer::new(provider, source, config.producer.interval());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(async move { producer.run(shutdown_rx).await });

    info!("   Press Ctrl+C to shutdown gracefully");
    bootstrap::shutdown_signal().await;

    info!("🛑 Shutdown signal received, stopping producer...");
    let _ = shutdown_tx.send(());
    match task.await {
        Ok(stats) => info!(
            ticks = stats.ticks,
            published = stats.published,
            fetch_failures = stats.fetch_failures,
            publish_failures = stats.publish_failures,
            "✅ State producer stopped"
        ),
        Err(e) => error!("State producer task failed: {}", e),
    }

    info!("👋 State Producer shutdown complete");
    Ok(())
}
