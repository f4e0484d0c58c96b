//! # Error Types
//!
//! Defines the error taxonomy shared across the relay runtimes.

use thiserror::Error;

/// Errors at the broker transport boundary.
///
/// Not retried by this layer; surfaced to the caller or worker owner.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The broker connection was closed.
    #[error("Broker connection closed")]
    Closed,

    /// Publish or subscribe targeted a queue that does not exist.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// A second consumer attempted to attach to an exclusive queue.
    #[error("Exclusive queue already has a consumer: {0}")]
    ExclusiveInUse(String),
}

/// Errors visible to a caller of `JobClient::call`.
///
/// Errors local to one call (timeout, processing failure) are resolved
/// within that call's lifecycle and never affect other in-flight calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The transport rejected the request publish. Surfaced immediately;
    /// no pending call is left registered.
    #[error("Request publish failed: {0}")]
    PublishFailed(TransportError),

    /// The call timeout elapsed before a response arrived.
    #[error("Call timed out")]
    TimedOut,

    /// The caller's cancellation signal fired before a response arrived.
    #[error("Call canceled")]
    Canceled,

    /// The client runtime was disposed or the broker closed while the call
    /// was outstanding.
    #[error("Transport closed while call was outstanding")]
    TransportClosed,

    /// The worker ran the job and reported that processing failed.
    /// Distinct from a transport-level error on the call itself.
    #[error("Job processing failed on the worker")]
    ProcessingFailed,

    /// A freshly generated correlation id collided with a pending call.
    /// Should be unreachable; treated as a local bug, never retried.
    #[error("Duplicate correlation id: {0}")]
    DuplicateCorrelationId(crate::CorrelationId),
}

/// Errors extracting an envelope from a delivered message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The message properties carried no correlation id.
    #[error("Message is missing a correlation id")]
    MissingCorrelationId,

    /// The request properties carried no reply address.
    #[error("Request is missing a reply address")]
    MissingReplyTo,
}

/// Errors raised by a [`JobProcessor`] invocation.
///
/// Converted into a failure response rather than propagated as a transport
/// fault, so the caller always gets a deterministic, timely answer.
///
/// [`JobProcessor`]: https://docs.rs/relay-worker
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessingError {
    /// The processor returned an error for this input.
    #[error("Processing failed: {0}")]
    Failed(String),

    /// The processor panicked; the panic was contained by the worker.
    #[error("Processor panicked")]
    Panicked,
}
