//! Background broadcast task
//!
//! Owns the source and its read position; nothing else touches them.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::pacer::Pacer;
use crate::registry::ConsumerRegistry;
use crate::source::ChunkSource;

use super::dispatcher::{DispatchReport, Dispatcher};

/// Source → pacer → dispatcher pipeline
pub struct Broadcaster<S> {
    source: S,
    pacer: Pacer,
    dispatcher: Dispatcher,
}

impl<S: ChunkSource> Broadcaster<S> {
    /// Create a broadcaster
    pub fn new(source: S, pacer: Pacer, dispatcher: Dispatcher) -> Self {
        Self {
            source,
            pacer,
            dispatcher,
        }
    }

    /// Registry the broadcast is delivered to
    pub fn registry(&self) -> &Arc<ConsumerRegistry> {
        self.dispatcher.registry()
    }

    /// Pacer between chunks
    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Read one chunk and deliver it, without pacing
    ///
    /// Returns `None` when the source failed; the failure is logged and the
    /// source has already restarted its pass.
    pub async fn step(&mut self) -> Option<DispatchReport> {
        let stats = Arc::clone(self.registry().stats());

        match self.source.next_chunk().await {
            Ok(chunk) => {
                stats.chunk_produced(chunk.len());
                if chunk.is_pass_start() && chunk.sequence > 0 {
                    stats.pass_started();
                    tracing::debug!(pass = chunk.pass, "Payload looped");
                }
                Some(self.dispatcher.dispatch(&chunk))
            }
            Err(e) => {
                stats.source_error();
                tracing::warn!(error = %e, "Source read failed, restarting from the beginning");
                None
            }
        }
    }

    /// Broadcast forever
    ///
    /// Failed reads still wait one interval before the next attempt.
    pub async fn run(mut self) {
        tracing::info!(
            chunk_size = self.source.chunk_size(),
            interval_ms = self.pacer.interval().as_millis() as u64,
            policy = %self.dispatcher.policy(),
            "Broadcast started"
        );

        loop {
            self.step().await;
            self.pacer.wait().await;
        }
    }

    /// Broadcast until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Broadcast stopped");
            }
            _ = self.run() => {}
        }
    }

    /// Run on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
