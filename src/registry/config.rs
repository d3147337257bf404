//! Registry configuration

use std::str::FromStr;

/// Default number of chunks a consumer may have queued
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// What happens to a consumer whose queue is full at delivery time
///
/// The policy belongs to the registry and applies to every delivery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// A slow reader is a disconnected reader: remove it from the registry and
    /// close its queue. The listener has to reconnect.
    #[default]
    Evict,
    /// Skip this one chunk for that consumer and keep it registered. The
    /// listener hears a gap but stays connected.
    Skip,
}

impl FromStr for DropPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evict" | "disconnect" => Ok(DropPolicy::Evict),
            "skip" | "drop" => Ok(DropPolicy::Skip),
            other => Err(format!(
                "unknown drop policy {other:?} (expected \"evict\" or \"skip\")"
            )),
        }
    }
}

impl std::fmt::Display for DropPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropPolicy::Evict => write!(f, "evict"),
            DropPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Consumer registry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Chunks each consumer may have queued before it counts as slow
    pub queue_capacity: usize,

    /// Applied when a consumer's queue is full
    pub drop_policy: DropPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drop_policy: DropPolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// Set the per-consumer queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the drop policy
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }
}
