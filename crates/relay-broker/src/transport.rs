//! # Transport Contract
//!
//! Defines the publishing side of the broker surface and the declaration /
//! subscription option types.

use async_trait::async_trait;
use bytes::Bytes;
use relay_types::{MessageProperties, TransportError};

/// How a queue is declared.
#[derive(Debug, Clone, Default)]
pub struct QueueSpec {
    /// Queue name; `None` asks the broker for a server-named queue.
    pub name: Option<String>,
    /// Survives broker restarts. Recorded but inert for the in-memory broker.
    pub durable: bool,
    /// Restricted to a single consumer.
    pub exclusive: bool,
    /// Deleted when the last consumer detaches.
    pub auto_delete: bool,
}

impl QueueSpec {
    /// The shared work queue workers consume from: non-durable,
    /// non-exclusive, never auto-deleted. Declared identically by both
    /// sides so either may start first.
    pub fn work_queue(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            durable: false,
            exclusive: false,
            auto_delete: false,
        }
    }

    /// A client's private reply queue: server-named, exclusive,
    /// auto-deleted when the client detaches.
    #[must_use]
    pub fn reply_queue() -> Self {
        Self {
            name: None,
            durable: false,
            exclusive: true,
            auto_delete: true,
        }
    }
}

/// Consumer options for a subscription.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeOptions {
    /// When set, deliveries are considered handled on receipt and carry no
    /// acknowledgment token.
    pub auto_ack: bool,
    /// Maximum delivered-but-unacknowledged messages this consumer may hold.
    /// `0` means unlimited. Ignored under `auto_ack`.
    pub prefetch: usize,
}

impl SubscribeOptions {
    /// Auto-acknowledging consumer (reply queues).
    #[must_use]
    pub fn auto_ack() -> Self {
        Self {
            auto_ack: true,
            prefetch: 0,
        }
    }

    /// Manually-acknowledging consumer holding at most `prefetch` in-flight
    /// deliveries.
    #[must_use]
    pub fn manual_ack(prefetch: usize) -> Self {
        Self {
            auto_ack: false,
            prefetch,
        }
    }
}

/// Trait for publishing messages to the broker.
///
/// This is the interface the client and worker runtimes use to emit
/// requests and responses.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// Publish a message to the queue named by `routing_key`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Closed`] when the broker connection is closed.
    /// - [`TransportError::UnknownQueue`] when no such queue exists (the
    ///   recipient's auto-delete queue may already be gone).
    async fn publish(
        &self,
        routing_key: &str,
        properties: MessageProperties,
        body: Bytes,
    ) -> Result<(), TransportError>;

    /// Get the total number of messages published.
    fn messages_published(&self) -> u64;
}
