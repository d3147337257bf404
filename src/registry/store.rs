//! Consumer registry implementation
//!
//! The set of live consumers and the only state shared between the
//! broadcast task and the per-consumer tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::source::Chunk;
use crate::stats::BroadcastStats;

use super::config::RegistryConfig;
use super::consumer::{ConsumerId, Subscription};

struct Members {
    queues: HashMap<ConsumerId, mpsc::Sender<Chunk>>,
    closed: bool,
}

/// Registry of live consumers
///
/// Every membership change and every delivery pass runs under one mutex.
/// Nothing awaits while holding it: enqueueing is a non-blocking
/// `try_send`, so a register or deregister waits at most one pass.
pub struct ConsumerRegistry {
    members: Mutex<Members>,
    next_id: AtomicU64,
    config: RegistryConfig,
    stats: Arc<BroadcastStats>,
}

impl ConsumerRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            members: Mutex::new(Members {
                queues: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
            config,
            stats: Arc::new(BroadcastStats::new()),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Counters shared with the broadcast task
    pub fn stats(&self) -> &Arc<BroadcastStats> {
        &self.stats
    }

    fn members(&self) -> MutexGuard<'_, Members> {
        // Critical sections never panic midway, so a poisoned map is still consistent
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new consumer
    ///
    /// Always succeeds. The consumer only sees chunks dispatched after this
    /// call returns. After [`close`](Self::close) the returned subscription
    /// is already at end-of-stream.
    pub fn register(self: &Arc<Self>) -> Subscription {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);

        let consumers = {
            let mut members = self.members();
            if members.closed {
                None
            } else {
                members.queues.insert(id, tx);
                Some(members.queues.len())
            }
        };

        match consumers {
            Some(consumers) => {
                self.stats.consumer_registered();
                tracing::debug!(consumer = %id, consumers, "Consumer registered");
            }
            None => tracing::debug!(consumer = %id, "Registration refused: registry closed"),
        }

        Subscription::new(id, rx, Arc::clone(self))
    }

    /// Remove a consumer
    ///
    /// Idempotent: returns `false` if the consumer was not registered
    /// (never was, already removed, or evicted).
    pub fn deregister(&self, id: ConsumerId) -> bool {
        let (removed, consumers) = {
            let mut members = self.members();
            let removed = members.queues.remove(&id).is_some();
            (removed, members.queues.len())
        };

        if removed {
            tracing::debug!(consumer = %id, consumers, "Consumer deregistered");
        }
        removed
    }

    /// Current membership, ordered by registration
    pub fn snapshot(&self) -> Vec<ConsumerId> {
        let mut ids: Vec<ConsumerId> = self.members().queues.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Check whether a consumer is registered
    pub fn contains(&self, id: ConsumerId) -> bool {
        self.members().queues.contains_key(&id)
    }

    /// Number of registered consumers
    pub fn len(&self) -> usize {
        self.members().queues.len()
    }

    /// True when nobody is listening
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one delivery pass
    ///
    /// `deliver` is called once per consumer with its queue; consumers for
    /// which it returns `false` are removed before the lock is released.
    pub(crate) fn retain<F>(&self, mut deliver: F)
    where
        F: FnMut(ConsumerId, &mpsc::Sender<Chunk>) -> bool,
    {
        self.members().queues.retain(|id, queue| deliver(*id, queue));
    }

    /// Drop every consumer and refuse new ones
    ///
    /// Closing the queues ends every consumer's stream once it has drained
    /// what was already queued. Used on shutdown.
    pub fn close(&self) {
        let dropped = {
            let mut members = self.members();
            members.closed = true;
            let dropped = members.queues.len();
            members.queues.clear();
            dropped
        };

        tracing::info!(consumers = dropped, "Consumer registry closed");
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.members().closed
    }
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;

    fn chunk(sequence: u64) -> Chunk {
        Chunk {
            data: Bytes::from(vec![sequence as u8; 4]),
            sequence,
            pass: 0,
            offset: sequence * 4,
        }
    }

    fn send_all(registry: &ConsumerRegistry, chunk: &Chunk) {
        registry.retain(|_, queue| queue.try_send(chunk.clone()).is_ok());
    }

    #[tokio::test]
    async fn test_register_deregister() {
        let registry = Arc::new(ConsumerRegistry::new());

        let a = registry.register();
        let b = registry.register();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.snapshot(), vec![a.id(), b.id()]);
        assert!(a.is_registered());

        assert!(registry.deregister(a.id()));
        assert_eq!(registry.snapshot(), vec![b.id()]);
        assert!(!a.is_registered());
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let registry = Arc::new(ConsumerRegistry::new());
        let sub = registry.register();
        let id = sub.id();

        assert!(registry.deregister(id));
        assert!(!registry.deregister(id));
        assert!(!registry.deregister(ConsumerId(9999)));

        // Dropping after an explicit deregister is a no-op too
        drop(sub);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let registry = Arc::new(ConsumerRegistry::new());
        let sub = registry.register();
        assert_eq!(registry.len(), 1);

        drop(sub);
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn test_late_registration_sees_only_later_chunks() {
        let registry = Arc::new(ConsumerRegistry::new());
        let mut early = registry.register();

        send_all(&registry, &chunk(0));
        let mut late = registry.register();
        send_all(&registry, &chunk(1));

        assert_eq!(early.recv().await.map(|c| c.sequence), Some(0));
        assert_eq!(early.recv().await.map(|c| c.sequence), Some(1));
        assert_eq!(late.recv().await.map(|c| c.sequence), Some(1));
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_recv_waits_for_delivery() {
        let registry = Arc::new(ConsumerRegistry::new());
        let mut sub = registry.register();

        {
            let mut recv = task::spawn(sub.recv());
            assert_pending!(recv.poll());

            send_all(&registry, &chunk(7));
            assert!(recv.is_woken());
            assert_ready_eq!(recv.poll(), Some(chunk(7)));
        }
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_refuses_new() {
        let registry = Arc::new(ConsumerRegistry::new());
        let mut sub = registry.register();
        send_all(&registry, &chunk(0));

        registry.close();
        assert!(registry.is_closed());
        assert!(registry.is_empty());

        // Queued chunk still drains, then end-of-stream
        assert_eq!(sub.recv().await.map(|c| c.sequence), Some(0));
        assert_eq!(sub.recv().await, None);

        let mut after = registry.register();
        assert!(!after.is_registered());
        assert_eq!(after.recv().await, None);
    }

    #[tokio::test]
    async fn test_refused_registration_not_counted() {
        let registry = Arc::new(ConsumerRegistry::new());
        let _live = registry.register();
        registry.close();

        let _refused = registry.register();
        let snapshot = registry.stats().snapshot(registry.len());
        assert_eq!(snapshot.consumers_registered, 1);
        assert_eq!(snapshot.active_consumers, 0);
    }

    #[tokio::test]
    async fn test_stats_count_registrations() {
        let registry = Arc::new(ConsumerRegistry::new());
        let _a = registry.register();
        let _b = registry.register();

        let snapshot = registry.stats().snapshot(registry.len());
        assert_eq!(snapshot.consumers_registered, 2);
        assert_eq!(snapshot.active_consumers, 2);
    }
}
