//! Fan-out dispatcher
//!
//! Hands one chunk to every registered consumer without ever waiting on
//! any of them.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use crate::registry::{ConsumerRegistry, DropPolicy};
use crate::source::Chunk;

/// Outcome of one delivery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Consumers that got the chunk queued
    pub delivered: usize,
    /// Consumers that missed the chunk under [`DropPolicy::Skip`]
    pub dropped: usize,
    /// Consumers removed under [`DropPolicy::Evict`]
    pub evicted: usize,
    /// Consumers whose receiving side was already gone
    pub closed: usize,
}

impl DispatchReport {
    /// Consumers looked at during the pass
    pub fn total(&self) -> usize {
        self.delivered + self.dropped + self.evicted + self.closed
    }
}

/// Delivers chunks to the consumers of one registry
pub struct Dispatcher {
    registry: Arc<ConsumerRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher for `registry`
    pub fn new(registry: Arc<ConsumerRegistry>) -> Self {
        Self { registry }
    }

    /// Registry this dispatcher delivers to
    pub fn registry(&self) -> &Arc<ConsumerRegistry> {
        &self.registry
    }

    /// Policy applied to full queues, fixed by the registry configuration
    pub fn policy(&self) -> DropPolicy {
        self.registry.config().drop_policy
    }

    /// Deliver `chunk` to every registered consumer
    ///
    /// Each consumer gets its own handle to the chunk via a non-blocking
    /// try-enqueue. A full queue is handled per [`DropPolicy`]; a queue
    /// whose receiver is gone is always removed.
    pub fn dispatch(&self, chunk: &Chunk) -> DispatchReport {
        let policy = self.policy();
        let mut report = DispatchReport::default();

        self.registry.retain(|id, queue| match queue.try_send(chunk.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => match policy {
                DropPolicy::Evict => {
                    report.evicted += 1;
                    tracing::info!(
                        consumer = %id,
                        sequence = chunk.sequence,
                        "Consumer evicted: queue full"
                    );
                    false
                }
                DropPolicy::Skip => {
                    report.dropped += 1;
                    tracing::trace!(consumer = %id, sequence = chunk.sequence, "Chunk skipped: queue full");
                    true
                }
            },
            Err(TrySendError::Closed(_)) => {
                report.closed += 1;
                false
            }
        });

        self.registry
            .stats()
            .delivery(report.delivered, report.dropped, report.evicted);

        report
    }
}
