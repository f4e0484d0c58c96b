//! # Request/Response Envelopes
//!
//! The RPC envelopes and their mapping onto broker message properties.
//!
//! ## Wire Contract
//!
//! - Correlation id and reply address are carried as message metadata
//!   ([`MessageProperties`]), never mixed into the payload bytes.
//! - Payload bytes are opaque binary end to end.
//! - A response signals processing failure with an explicit `failed` flag in
//!   its properties, so an empty successful result stays distinguishable
//!   from a failed job.

use crate::correlation::CorrelationId;
use crate::errors::EnvelopeError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The name of the private reply queue a response must be published to.
///
/// One reply address serves all calls issued by a client instance; it is
/// created at client construction and outlives all pending calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyAddress(String);

impl ReplyAddress {
    /// Wrap a queue name as a reply address.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self(queue_name.into())
    }

    /// The underlying queue name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broker message metadata carried beside the payload.
///
/// The transport treats these as opaque properties; only the RPC layer
/// assigns them meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    /// Request: the fresh id for this call. Response: echoed from the request.
    pub correlation_id: Option<CorrelationId>,
    /// Request only: where the response must be published.
    pub reply_to: Option<ReplyAddress>,
    /// Response only: set when the job processor reported failure.
    pub failed: bool,
}

/// A job request: correlation id, reply address, and the raw input payload.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Fresh id generated by the issuing client.
    pub correlation_id: CorrelationId,
    /// The issuing client's reply queue.
    pub reply_to: ReplyAddress,
    /// Raw input bytes to be processed.
    pub body: Bytes,
}

impl JobRequest {
    /// Build a request envelope for a fresh call.
    pub fn new(correlation_id: CorrelationId, reply_to: ReplyAddress, body: Bytes) -> Self {
        Self {
            correlation_id,
            reply_to,
            body,
        }
    }

    /// The message properties this request publishes with.
    #[must_use]
    pub fn properties(&self) -> MessageProperties {
        MessageProperties {
            correlation_id: Some(self.correlation_id),
            reply_to: Some(self.reply_to.clone()),
            failed: false,
        }
    }

    /// Extract a request from a delivered message.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when the properties are missing the
    /// correlation id or the reply address. Such a message cannot be
    /// answered and must be discarded by the worker.
    pub fn from_message(
        properties: &MessageProperties,
        body: Bytes,
    ) -> Result<Self, EnvelopeError> {
        let correlation_id = properties
            .correlation_id
            .ok_or(EnvelopeError::MissingCorrelationId)?;
        let reply_to = properties
            .reply_to
            .clone()
            .ok_or(EnvelopeError::MissingReplyTo)?;
        Ok(Self {
            correlation_id,
            reply_to,
            body,
        })
    }
}

/// The outcome a worker reports back for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Processing succeeded; the payload is the processed output
    /// (possibly empty).
    Completed(Bytes),
    /// Processing failed on the worker.
    Failed,
}

/// A job response: the echoed correlation id and the outcome.
#[derive(Debug, Clone)]
pub struct JobResponse {
    /// Echoed from the originating request.
    pub correlation_id: CorrelationId,
    /// Success payload or failure marker.
    pub outcome: JobOutcome,
}

impl JobResponse {
    /// Build a success response carrying the processed output.
    pub fn completed(correlation_id: CorrelationId, output: Bytes) -> Self {
        Self {
            correlation_id,
            outcome: JobOutcome::Completed(output),
        }
    }

    /// Build a failure response.
    pub fn failed(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            outcome: JobOutcome::Failed,
        }
    }

    /// Split into the properties and body this response publishes with.
    ///
    /// A failure publishes an empty body with the `failed` flag set.
    #[must_use]
    pub fn into_wire(self) -> (MessageProperties, Bytes) {
        let (failed, body) = match self.outcome {
            JobOutcome::Completed(output) => (false, output),
            JobOutcome::Failed => (true, Bytes::new()),
        };
        (
            MessageProperties {
                correlation_id: Some(self.correlation_id),
                reply_to: None,
                failed,
            },
            body,
        )
    }

    /// Extract a response from a delivered message.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingCorrelationId`] when the properties
    /// carry no correlation id; such a response cannot be matched to a
    /// pending call and is dropped.
    pub fn from_message(
        properties: &MessageProperties,
        body: Bytes,
    ) -> Result<Self, EnvelopeError> {
        let correlation_id = properties
            .correlation_id
            .ok_or(EnvelopeError::MissingCorrelationId)?;
        let outcome = if properties.failed {
            JobOutcome::Failed
        } else {
            JobOutcome::Completed(body)
        };
        Ok(Self {
            correlation_id,
            outcome,
        })
    }
}
