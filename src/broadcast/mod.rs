//! Broadcast pipeline
//!
//! One background task drives the whole pipeline:
//!
//! ```text
//!  ChunkSource ──next_chunk()──► Dispatcher ──try_send──► per-consumer queues
//!       ▲                             │
//!       └────── Pacer::wait() ◄───────┘
//! ```
//!
//! The pacer sleep is the only suspension point of the loop besides the read
//! itself. Delivery never waits on a consumer: a full queue is resolved by
//! the registry's [`DropPolicy`](crate::registry::DropPolicy) on the spot.

pub mod broadcaster;
pub mod dispatcher;

pub use broadcaster::Broadcaster;
pub use dispatcher::{DispatchReport, Dispatcher};
