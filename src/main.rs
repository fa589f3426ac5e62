//! nodesync entry point.

use log::{error, info};
use tokio::signal;
use tokio::sync::mpsc;

use nodesync::pipeline::run_pipeline;
use nodesync::source::{EventSource, JsonLinesSource};
use nodesync::{Config, NodeUpdateProcessor, UpdateProcessor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting nodesync with config: {:?}", cfg);

    let processor = NodeUpdateProcessor::new(cfg.processor_options());
    processor.on_syncer_starting();

    // Event channel
    let (event_tx, event_rx) = mpsc::channel(cfg.channel_capacity);

    // Event source
    let source = JsonLinesSource::new(cfg.input.clone());
    let source_handle = tokio::spawn(async move {
        if let Err(e) = source.run(event_tx).await {
            error!("Event source failed: {}", e);
        }
    });

    // Translate until the source is exhausted or we are interrupted
    tokio::select! {
        res = run_pipeline(&processor, event_rx, tokio::io::stdout()) => match res {
            Ok(written) => info!("Wrote {} records", written),
            Err(e) => error!("Pipeline failed: {}", e),
        },
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        },
    }

    source_handle.abort();

    info!("Shutdown complete.");
    Ok(())
}
