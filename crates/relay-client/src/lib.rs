//! # Relay Client - Caller Side of Vision-Relay
//!
//! Turns the broker's one-way publish/subscribe primitives into a
//! caller-visible call/response abstraction.
//!
//! ## Call Flow
//!
//! ```text
//! caller task                listener task           broker
//!     │ register(id)              │                    │
//!     │ publish(request) ─────────┼──────────────────→ │
//!     │ await {reply,timer,cancel}│                    │
//!     │                           │ ←──── response ─── │
//!     │ ←──── resolve(id, reply) ─┤                    │
//!     ▼                           ▼                    ▼
//! ```
//!
//! One private reply queue serves all calls of a client instance; responses
//! are discriminated solely by correlation id. A response whose id is no
//! longer pending (timed out, canceled, duplicate) is dropped and counted,
//! never an error.

pub mod client;
pub mod pending;

// Re-export main types
pub use client::JobClient;
pub use pending::{CallReply, PendingCallTable, PendingStats};
