//! # Relay Broker - Transport Surface for Vision-Relay
//!
//! The queue transport consumed by the client and worker runtimes.
//!
//! ## Surface
//!
//! - Queue declaration (durable / exclusive / auto-delete, server-named
//!   queues)
//! - Publish with message properties
//! - Subscribe with explicit acknowledgment and per-consumer prefetch
//!
//! ```text
//! ┌──────────────┐                       ┌──────────────┐
//! │  JobClient   │                       │ ImageWorker  │
//! │              │   publish(request)    │              │
//! │              │ ──────┐               │              │
//! └──────────────┘       │               └──────────────┘
//!        ↑               ▼                       ↑
//!        │         ┌──────────────┐             │
//!        │         │    Broker    │ ────────────┘
//!        └──────── │              │   subscribe(work queue)
//!  subscribe       └──────────────┘
//!  (reply queue)
//! ```
//!
//! ## Delivery Lifecycle
//!
//! A manual-ack [`Delivery`] must reach exactly one terminal state:
//! `ack` (consumed) or `reject` (discarded or requeued). Both consume the
//! handle, so acknowledging twice is unrepresentable; dropping an
//! unacknowledged handle releases the consumer's in-flight slot so a fault
//! can never stall a worker forever.
//!
//! The [`MemoryBroker`] implementation is suitable for single-process
//! operation; distributed deployments would put an AMQP-backed transport
//! behind the same surface.

pub mod delivery;
pub mod memory;
pub mod transport;

// Re-export main types
pub use delivery::{Delivery, Subscription};
pub use memory::MemoryBroker;
pub use transport::{BrokerPublisher, QueueSpec, SubscribeOptions};

/// Prefix for server-named (client-private) queues.
pub const GENERATED_QUEUE_PREFIX: &str = "gen-";
