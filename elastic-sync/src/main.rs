//! Entry point for the elastic-sync indexing service.

use elastic_sync::{Dependencies, IndexingError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let deps = Dependencies::new().await?;

    // The change source and entity scanner are supplied by the embedding
    // deployment; the binary evaluates the reindex window and reports it.
    if deps.reindexer.due() {
        info!("Startup reindex window is open, waiting for an entity scanner to drive it");
    } else {
        info!("Startup reindex window is closed");
    }

    info!("elastic-sync started");

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    deps.writer.stop().await?;
    info!("Shutdown complete");

    Ok(())
}
