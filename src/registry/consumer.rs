//! Consumer identity and the subscription handle held by a consumer task

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::source::Chunk;

use super::store::ConsumerRegistry;

/// Identity of one registered consumer
///
/// Ids are never reused within a registry, so two connections from the same
/// peer are always distinct consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub(super) u64);

impl ConsumerId {
    /// Raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receiving end of one consumer's bounded queue
///
/// Chunks come out in the order the source produced them. `recv` returns
/// `None` once the consumer was evicted (or the registry shut down) and the
/// chunks queued before that have been drained.
///
/// Dropping the subscription deregisters the consumer, so a consumer task
/// that fails halfway cannot leave a stale registry entry behind.
pub struct Subscription {
    id: ConsumerId,
    rx: mpsc::Receiver<Chunk>,
    registry: Arc<ConsumerRegistry>,
}

impl Subscription {
    pub(super) fn new(id: ConsumerId, rx: mpsc::Receiver<Chunk>, registry: Arc<ConsumerRegistry>) -> Self {
        Self { id, rx, registry }
    }

    /// Id of this consumer
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Wait for the next chunk
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    /// Take a queued chunk without waiting
    pub fn try_recv(&mut self) -> Option<Chunk> {
        self.rx.try_recv().ok()
    }

    /// Whether the registry still delivers to this consumer
    pub fn is_registered(&self) -> bool {
        self.registry.contains(self.id)
    }
}

impl Stream for Subscription {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
