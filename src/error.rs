//! Error types
//!
//! Only startup can fail fatally. Everything that goes wrong once the
//! broadcast is running (bad reads, slow or vanished consumers) is handled
//! where it happens and never reaches the caller as an `Error`.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal startup errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The payload could not be opened or read
    #[error("payload {}: {source}", .path.display())]
    Payload {
        /// Path that was configured
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The payload exists but holds no bytes, so there is nothing to broadcast
    #[error("payload {} is empty", .0.display())]
    EmptyPayload(PathBuf),

    /// The listening address is unavailable
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A configuration value was missing or out of range
    #[error("invalid configuration {key}: {reason}")]
    Config {
        /// Setting name (environment variable or builder field)
        key: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Other I/O failure while serving
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(key: &'static str, reason: impl Into<String>) -> Self {
        Error::Config {
            key,
            reason: reason.into(),
        }
    }

    pub(crate) fn payload(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Payload {
            path: path.into(),
            source,
        }
    }
}
