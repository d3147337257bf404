//! loopcast: broadcast one audio file in a loop over HTTP.
//!
//! Configured through the environment (`FILENAME`, `PORT`, ...), see
//! [`ServerConfig::from_lookup`].

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use loopcast::{ServerConfig, StreamServer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().context("failed to read configuration")?;
    let server = StreamServer::bind(config)
        .await
        .context("failed to start stream server")?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("loopcast stopped");
    Ok(())
}
