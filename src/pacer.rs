//! Output pacing
//!
//! Turns a payload that can be read as fast as storage allows into a stream
//! that advances at roughly the target bitrate. The pacer sleeps one fixed
//! interval per chunk:
//!
//! ```text
//! interval = chunk_size_bytes * 8 / bitrate_bits_per_second
//! ```
//!
//! Pacing is advisory. When the scheduler wakes us late the lost time is not
//! made up with a burst; the next interval starts from whenever we resumed.

use std::time::Duration;

use crate::error::{Error, Result};

/// Fixed-interval sleeper placed between chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    /// Create a pacer with an explicit interval
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Create a pacer for `chunk_size` byte chunks at `bitrate` bits per second
    pub fn for_bitrate(chunk_size: usize, bitrate: u64) -> Result<Self> {
        if bitrate == 0 {
            return Err(Error::config("bitrate", "must be greater than zero"));
        }

        let bits = chunk_size as u128 * 8;
        let nanos = bits * 1_000_000_000 / bitrate as u128;
        let nanos = u64::try_from(nanos)
            .map_err(|_| Error::config("bitrate", "pacing interval out of range"))?;

        Ok(Self::new(Duration::from_nanos(nanos)))
    }

    /// Sleep between two consecutive chunks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Approximate bits per second delivered for `chunk_size` byte chunks
    pub fn effective_bitrate(&self, chunk_size: usize) -> u64 {
        let nanos = self.interval.as_nanos();
        if nanos == 0 {
            return 0;
        }
        (chunk_size as u128 * 8 * 1_000_000_000 / nanos) as u64
    }

    /// Wait one interval
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.interval).await;
        }
    }
}
