//! Statistics and metrics for the broadcast

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Broadcast-wide counters
///
/// Updated by the broadcast task and the registry without locking; read at
/// any time through [`snapshot`](Self::snapshot).
#[derive(Debug)]
pub struct BroadcastStats {
    started_at: Instant,
    chunks_produced: AtomicU64,
    bytes_produced: AtomicU64,
    passes: AtomicU64,
    source_errors: AtomicU64,
    consumers_registered: AtomicU64,
    consumers_evicted: AtomicU64,
    chunks_delivered: AtomicU64,
    chunks_dropped: AtomicU64,
}

impl BroadcastStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            chunks_produced: AtomicU64::new(0),
            bytes_produced: AtomicU64::new(0),
            passes: AtomicU64::new(0),
            source_errors: AtomicU64::new(0),
            consumers_registered: AtomicU64::new(0),
            consumers_evicted: AtomicU64::new(0),
            chunks_delivered: AtomicU64::new(0),
            chunks_dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn chunk_produced(&self, len: usize) {
        self.chunks_produced.fetch_add(1, Ordering::Relaxed);
        self.bytes_produced.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn pass_started(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn consumer_registered(&self) {
        self.consumers_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivery(&self, delivered: usize, dropped: usize, evicted: usize) {
        self.chunks_delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        self.chunks_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        self.consumers_evicted.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Time since the counters were created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average produced bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime().as_secs();
        if secs > 0 {
            (self.bytes_produced.load(Ordering::Relaxed) * 8) / secs
        } else {
            0
        }
    }

    /// Copy the counters out
    pub fn snapshot(&self, active_consumers: usize) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            active_consumers,
            chunks_produced: self.chunks_produced.load(Ordering::Relaxed),
            bytes_produced: self.bytes_produced.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            consumers_registered: self.consumers_registered.load(Ordering::Relaxed),
            consumers_evicted: self.consumers_evicted.load(Ordering::Relaxed),
            chunks_delivered: self.chunks_delivered.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            bitrate: self.bitrate(),
        }
    }
}

impl Default for BroadcastStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`BroadcastStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Seconds since startup
    pub uptime_secs: u64,
    /// Consumers currently registered
    pub active_consumers: usize,
    /// Chunks read from the source
    pub chunks_produced: u64,
    /// Bytes read from the source
    pub bytes_produced: u64,
    /// Passes over the payload that were started after the first one
    pub passes: u64,
    /// Transient read failures
    pub source_errors: u64,
    /// Consumers ever registered
    pub consumers_registered: u64,
    /// Consumers removed because their queue was full
    pub consumers_evicted: u64,
    /// Chunk copies enqueued across all consumers
    pub chunks_delivered: u64,
    /// Chunk copies skipped because a queue was full
    pub chunks_dropped: u64,
    /// Average produced bitrate (bits/sec)
    pub bitrate: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = BroadcastStats::new();
        let snapshot = stats.snapshot(0);

        assert_eq!(snapshot.chunks_produced, 0);
        assert_eq!(snapshot.bytes_produced, 0);
        assert_eq!(snapshot.consumers_registered, 0);
        assert_eq!(snapshot.consumers_evicted, 0);
        assert_eq!(snapshot.bitrate, 0);
    }

    #[test]
    fn test_stats_counts() {
        let stats = BroadcastStats::new();

        stats.chunk_produced(1600);
        stats.chunk_produced(1600);
        stats.pass_started();
        stats.source_error();
        stats.consumer_registered();
        stats.delivery(3, 1, 1);

        let snapshot = stats.snapshot(2);
        assert_eq!(snapshot.active_consumers, 2);
        assert_eq!(snapshot.chunks_produced, 2);
        assert_eq!(snapshot.bytes_produced, 3200);
        assert_eq!(snapshot.passes, 1);
        assert_eq!(snapshot.source_errors, 1);
        assert_eq!(snapshot.consumers_registered, 1);
        assert_eq!(snapshot.chunks_delivered, 3);
        assert_eq!(snapshot.chunks_dropped, 1);
        assert_eq!(snapshot.consumers_evicted, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = StatsSnapshot {
            active_consumers: 3,
            chunks_produced: 10,
            ..Default::default()
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["active_consumers"], 3);
        assert_eq!(json["chunks_produced"], 10);
        assert_eq!(json["consumers_evicted"], 0);
    }
}
