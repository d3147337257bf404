//! Consumer registry
//!
//! The registry is the set of currently connected consumers. Each consumer
//! owns a bounded queue; the registry keeps the sending half, the consumer
//! task keeps the receiving half inside a [`Subscription`].
//!
//! # Architecture
//!
//! ```text
//!                         Arc<ConsumerRegistry>
//!                    ┌─────────────────────────────┐
//!                    │ Mutex<HashMap<ConsumerId,   │
//!                    │   mpsc::Sender<Chunk>>>     │
//!                    └──────────────┬──────────────┘
//!                                   │
//!        ┌──────────────────────────┼──────────────────────────┐
//!        │                          │                          │
//!        ▼                          ▼                          ▼
//!   [Broadcaster]             [Consumer task]            [Consumer task]
//!   dispatch(chunk)           sub.recv()                 sub.recv()
//!        │                          │                          │
//!        └──► try_send per queue ──►└──► HTTP body ──► TCP     └──► ...
//! ```
//!
//! Registration, deregistration and a delivery pass never interleave. A
//! consumer whose queue is full is handled per [`DropPolicy`].

pub mod config;
pub mod consumer;
pub mod store;

pub use config::{DropPolicy, RegistryConfig, DEFAULT_QUEUE_CAPACITY};
pub use consumer::{ConsumerId, Subscription};
pub use store::ConsumerRegistry;
