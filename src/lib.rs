//! # loopcast
//!
//! Looping single-source audio broadcaster.
//!
//! A payload (usually an audio file) is cut into fixed-size chunks, paced to
//! a target bitrate and fanned out to every connected listener, looping
//! forever. Listeners that fall behind never slow anyone else down: a full
//! queue is handled by the registry's drop policy without blocking.
//!
//! ```text
//!  Source ──► Pacer ──► Dispatcher ──► [queue] ──► consumer task ──► HTTP peer
//!                           │      └─► [queue] ──► consumer task ──► HTTP peer
//!                           ▼
//!                    ConsumerRegistry
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use loopcast::{ServerConfig, StreamServer};
//!
//! # async fn example() -> loopcast::Result<()> {
//! let config = ServerConfig::default()
//!     .payload("loop.mp3")
//!     .bitrate(128_000);
//!
//! let server = StreamServer::bind(config).await?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod error;
pub mod pacer;
pub mod registry;
pub mod server;
pub mod source;
pub mod stats;

pub use broadcast::{Broadcaster, DispatchReport, Dispatcher};
pub use error::{Error, Result};
pub use pacer::Pacer;
pub use registry::{ConsumerId, ConsumerRegistry, DropPolicy, RegistryConfig, Subscription};
pub use server::{ServerConfig, StreamServer};
pub use source::{Chunk, ChunkSource, FileSource, MemorySource, PayloadSource, SourceMode};
pub use stats::{BroadcastStats, StatsSnapshot};
