//! # Subscriptions and Deliveries
//!
//! The consuming side of the broker surface: `Subscription::recv` yields
//! `Delivery` handles that must reach exactly one terminal state.

use crate::memory::{BrokerInner, QueueCore, QueuedMessage};
use bytes::Bytes;
use relay_types::MessageProperties;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A consumer attached to one queue.
///
/// Dropping the subscription detaches the consumer; an auto-delete queue
/// whose last consumer detaches is removed from the broker.
pub struct Subscription {
    queue: Arc<QueueCore>,
    broker: Arc<BrokerInner>,
    closed: watch::Receiver<bool>,
    auto_ack: bool,
    permits: Option<Arc<Semaphore>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("queue", &self.queue.name)
            .field("auto_ack", &self.auto_ack)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(
        queue: Arc<QueueCore>,
        broker: Arc<BrokerInner>,
        closed: watch::Receiver<bool>,
        auto_ack: bool,
        permits: Option<Arc<Semaphore>>,
    ) -> Self {
        Self {
            queue,
            broker,
            closed,
            auto_ack,
            permits,
        }
    }

    /// The queue this subscription consumes from.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue.name
    }

    /// Receive the next delivery.
    ///
    /// Respects the consumer's prefetch limit: when the configured number
    /// of deliveries are in flight (unacknowledged), `recv` waits until one
    /// of them reaches a terminal state before yielding the next message.
    ///
    /// # Returns
    ///
    /// - `Some(delivery)` - The next message from the queue
    /// - `None` - The broker was closed
    pub async fn recv(&mut self) -> Option<Delivery> {
        if *self.closed.borrow_and_update() {
            return None;
        }

        // The permit is acquired before the message and travels inside the
        // delivery until acknowledgment, bounding in-flight work.
        let permit = match &self.permits {
            Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return None,
            },
            None => None,
        };

        let queue = Arc::clone(&self.queue);
        let message = tokio::select! {
            message = async move {
                let mut rx = queue.rx.lock().await;
                rx.recv().await
            } => message?,
            _ = self.closed.changed() => return None,
        };

        let token = if self.auto_ack {
            None
        } else {
            Some(AckToken {
                _permit: permit,
                requeue_tx: self.queue.tx.clone(),
            })
        };

        Some(Delivery {
            properties: message.properties,
            body: message.body,
            token,
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.queue.consumers.fetch_sub(1, Ordering::SeqCst) - 1;
        if self.queue.auto_delete && remaining == 0 {
            self.broker.remove_queue(&self.queue.name);
        }
        debug!(queue = %self.queue.name, "Subscription dropped");
    }
}

/// Holds the in-flight slot for one unacknowledged delivery.
///
/// Dropping the token releases the slot, whether or not the delivery was
/// explicitly acknowledged.
struct AckToken {
    _permit: Option<OwnedSemaphorePermit>,
    requeue_tx: mpsc::UnboundedSender<QueuedMessage>,
}

/// One in-flight message delivered to a consumer.
///
/// Manual-ack deliveries must be consumed by exactly one of [`ack`] or
/// [`reject`]; both take the handle by value, so a second acknowledgment
/// does not compile. A handle dropped without either (a fault between
/// receipt and acknowledgment) releases the consumer's in-flight slot and
/// consumes the message, so the worker can never be stalled by an
/// unacknowledged delivery.
///
/// [`ack`]: Delivery::ack
/// [`reject`]: Delivery::reject
pub struct Delivery {
    properties: MessageProperties,
    body: Bytes,
    token: Option<AckToken>,
}

impl Delivery {
    /// Message metadata.
    #[must_use]
    pub fn properties(&self) -> &MessageProperties {
        &self.properties
    }

    /// Opaque message payload.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Acknowledge the delivery: the message is consumed and the in-flight
    /// slot released.
    pub fn ack(mut self) {
        self.token.take();
    }

    /// Negatively acknowledge the delivery.
    ///
    /// With `requeue`, the message returns to its queue for redelivery;
    /// otherwise it is discarded.
    pub fn reject(mut self, requeue: bool) {
        if let Some(token) = self.token.take() {
            if requeue {
                let _ = token.requeue_tx.send(QueuedMessage {
                    properties: self.properties.clone(),
                    body: self.body.clone(),
                });
            }
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if self.token.is_some() {
            debug!("Delivery dropped without explicit acknowledgment; releasing in-flight slot");
        }
    }
}
