//! # Relay Worker - Processing Side of Vision-Relay
//!
//! Consumes the well-known work queue one delivery at a time, invokes the
//! job processor, answers the caller's reply queue, and acknowledges each
//! delivery exactly once.
//!
//! ## Per-Delivery State Machine
//!
//! ```text
//! Received ──(malformed envelope)──→ reject ──→ Discarded
//!    │
//!    ▼
//! Processing ──→ Succeeded ──┐
//!    │                       ├──→ publish reply ──→ ack ──→ Acknowledged
//!    └────────→ Failed ──────┘
//! ```
//!
//! A failed job is still answered: the caller receives a failure-flagged
//! response instead of waiting forever on a silently dropped message. The
//! delivery is acknowledged after the reply publish attempt regardless of
//! outcome; redelivery would retry a likely-deterministic failure
//! indefinitely.
//!
//! ## Concurrency
//!
//! Each worker holds exactly one in-flight delivery (prefetch = 1), making
//! it a single-concurrency unit; scale horizontally by running more worker
//! processes.

pub mod processor;
pub mod worker;

// Re-export main types
pub use processor::JobProcessor;
pub use worker::{ImageWorker, WorkerStats};

/// In-flight limit per worker process.
pub const WORKER_PREFETCH: usize = 1;
