//! HTTP stream server
//!
//! The network-facing side of the broadcast: one long-lived HTTP response per
//! listener, each served by its own connection task.

pub mod config;
pub(crate) mod handler;
pub mod listener;

pub use config::ServerConfig;
pub use listener::StreamServer;
