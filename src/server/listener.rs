//! Stream server listener
//!
//! Validates the payload, binds the socket, then runs the broadcast task and
//! the HTTP accept loop side by side.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::broadcast::{Broadcaster, Dispatcher};
use crate::error::{Error, Result};
use crate::registry::ConsumerRegistry;
use crate::server::config::ServerConfig;
use crate::server::handler::{self, AppState};
use crate::source::PayloadSource;

/// Looping broadcast server
pub struct StreamServer {
    config: ServerConfig,
    listener: TcpListener,
    registry: Arc<ConsumerRegistry>,
    broadcaster: Broadcaster<PayloadSource>,
}

impl StreamServer {
    /// Prepare everything that can fail at startup
    ///
    /// An unreadable payload, invalid settings or an unavailable address are
    /// reported here; nothing is running yet if this returns an error.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let pacer = config.pacer()?;
        let source = PayloadSource::open(&config.payload, config.chunk_size, config.source_mode).await?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: config.bind_addr,
                source,
            })?;

        let registry = Arc::new(ConsumerRegistry::with_config(config.registry.clone()));
        let broadcaster = Broadcaster::new(source, pacer, Dispatcher::new(Arc::clone(&registry)));

        tracing::info!(
            addr = %listener.local_addr()?,
            payload = %config.payload.display(),
            mode = %config.source_mode,
            chunk_size = config.chunk_size,
            bitrate = config.bitrate,
            "Stream server bound"
        );

        Ok(Self {
            config,
            listener,
            registry,
            broadcaster,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a reference to the consumer registry
    pub fn registry(&self) -> &Arc<ConsumerRegistry> {
        &self.registry
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` resolves the broadcast stops and every consumer queue
    /// is closed, so open streams end and the server can drain. Connections
    /// still open after the configured drain timeout (a listener that
    /// stopped reading) are abandoned and this returns anyway.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            config,
            listener,
            registry,
            broadcaster,
        } = self;

        let addr = listener.local_addr()?;
        let broadcast_handle = broadcaster.spawn();
        let broadcast_abort = broadcast_handle.abort_handle();

        let app = handler::router(AppState::new(&config, Arc::clone(&registry)));

        let (fired_tx, fired_rx) = oneshot::channel::<()>();
        let closing = Arc::clone(&registry);
        let shutdown = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            broadcast_abort.abort();
            closing.close();
            let _ = fired_tx.send(());
        };

        // Only armed once the shutdown signal fired
        let drain_timeout = config.drain_timeout;
        let drain_deadline = async move {
            match fired_rx.await {
                Ok(()) => tokio::time::sleep(drain_timeout).await,
                Err(_) => std::future::pending().await,
            }
        };

        tracing::info!("Streaming on http://{}", addr);
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .into_future();

        let result = tokio::select! {
            result = serve => result,
            _ = drain_deadline => {
                tracing::warn!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Connections still open after drain timeout, abandoning them"
                );
                Ok(())
            }
        };

        broadcast_handle.abort();
        registry.close();

        result.map_err(Error::from)
    }
}
