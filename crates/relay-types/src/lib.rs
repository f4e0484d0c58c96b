//! # Relay Types Crate
//!
//! This crate contains the shared RPC vocabulary for Vision-Relay: the
//! correlation identifier, the request/response envelopes and their mapping
//! onto broker message properties, the error taxonomy, and the relay
//! configuration.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-runtime types are defined here.
//! - **Metadata beside the payload**: Correlation id and reply address travel
//!   as message properties, never inside the payload bytes.
//! - **Opaque bodies**: Payloads are raw binary end to end; this layer imposes
//!   no structure on them.

pub mod config;
pub mod correlation;
pub mod envelope;
pub mod errors;

pub use config::RelayConfig;
pub use correlation::CorrelationId;
pub use envelope::{JobOutcome, JobRequest, JobResponse, MessageProperties, ReplyAddress};
pub use errors::{CallError, EnvelopeError, ProcessingError, TransportError};
