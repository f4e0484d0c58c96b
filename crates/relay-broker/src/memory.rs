//! # In-Memory Broker
//!
//! Single-process implementation of the broker surface.
//!
//! Queues are competing-consumer: each message is delivered to exactly one
//! subscriber. Suitable for single-node operation; distributed deployments
//! would use a different implementation (e.g. an AMQP client) behind the
//! same surface.

use crate::delivery::Subscription;
use crate::transport::{BrokerPublisher, QueueSpec, SubscribeOptions};
use crate::GENERATED_QUEUE_PREFIX;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use relay_types::{MessageProperties, TransportError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tracing::{debug, warn};
use uuid::Uuid;

/// A message at rest in a queue.
pub(crate) struct QueuedMessage {
    pub(crate) properties: MessageProperties,
    pub(crate) body: Bytes,
}

/// Shared state of one declared queue.
pub(crate) struct QueueCore {
    pub(crate) name: String,
    durable: bool,
    exclusive: bool,
    pub(crate) auto_delete: bool,
    pub(crate) tx: mpsc::UnboundedSender<QueuedMessage>,
    pub(crate) rx: Mutex<mpsc::UnboundedReceiver<QueuedMessage>>,
    pub(crate) consumers: AtomicUsize,
}

impl QueueCore {
    fn matches(&self, spec: &QueueSpec) -> bool {
        self.durable == spec.durable
            && self.exclusive == spec.exclusive
            && self.auto_delete == spec.auto_delete
    }
}

/// Broker-wide shared state.
pub(crate) struct BrokerInner {
    queues: RwLock<HashMap<String, Arc<QueueCore>>>,
    pub(crate) closed: watch::Sender<bool>,
    published: AtomicU64,
}

impl BrokerInner {
    /// Remove a queue from the registry (auto-delete path).
    pub(crate) fn remove_queue(&self, name: &str) {
        if self.queues.write().remove(name).is_some() {
            debug!(queue = name, "Auto-deleted queue");
        }
    }
}

/// In-memory message broker.
///
/// Holds the queue registry and the process-wide closed flag. Opened at
/// runtime construction and closed at disposal; injected into the client
/// and worker runtimes as an explicitly owned handle.
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    /// Create a new open broker with no queues.
    #[must_use]
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(BrokerInner {
                queues: RwLock::new(HashMap::new()),
                closed,
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Declare a queue, creating it if absent.
    ///
    /// Returns the queue name, generated when `spec.name` is `None`
    /// (server-named queues). Re-declaration of an existing queue is
    /// idempotent; mismatched settings are logged and the existing queue
    /// kept.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] when the broker is closed.
    pub fn declare_queue(&self, spec: QueueSpec) -> Result<String, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("{}{}", GENERATED_QUEUE_PREFIX, Uuid::new_v4()));

        let mut queues = self.inner.queues.write();
        if let Some(existing) = queues.get(&name) {
            if !existing.matches(&spec) {
                warn!(
                    queue = %name,
                    "Queue re-declared with different settings; keeping existing declaration"
                );
            }
            return Ok(name);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        queues.insert(
            name.clone(),
            Arc::new(QueueCore {
                name: name.clone(),
                durable: spec.durable,
                exclusive: spec.exclusive,
                auto_delete: spec.auto_delete,
                tx,
                rx: Mutex::new(rx),
                consumers: AtomicUsize::new(0),
            }),
        );
        debug!(queue = %name, "Declared queue");
        Ok(name)
    }

    /// Attach a consumer to a queue.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Closed`] when the broker is closed.
    /// - [`TransportError::UnknownQueue`] when the queue was never declared
    ///   or has been auto-deleted.
    /// - [`TransportError::ExclusiveInUse`] when the queue is exclusive and
    ///   already has a consumer.
    pub fn subscribe(
        &self,
        queue: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let core = self
            .inner
            .queues
            .read()
            .get(queue)
            .cloned()
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_string()))?;

        if core.exclusive && core.consumers.load(Ordering::SeqCst) > 0 {
            return Err(TransportError::ExclusiveInUse(queue.to_string()));
        }
        core.consumers.fetch_add(1, Ordering::SeqCst);

        let permits = if !options.auto_ack && options.prefetch > 0 {
            Some(Arc::new(Semaphore::new(options.prefetch)))
        } else {
            None
        };

        debug!(
            queue = %queue,
            auto_ack = options.auto_ack,
            prefetch = options.prefetch,
            "New subscription created"
        );

        Ok(Subscription::new(
            core,
            Arc::clone(&self.inner),
            self.inner.closed.subscribe(),
            options.auto_ack,
            permits,
        ))
    }

    /// Close the broker. Subsequent publishes fail with
    /// [`TransportError::Closed`] and every subscription's `recv` returns
    /// `None`.
    pub fn close(&self) {
        debug!("Closing broker");
        let _ = self.inner.closed.send(true);
    }

    /// Whether the broker has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Number of currently declared queues.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.inner.queues.read().len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerPublisher for MemoryBroker {
    async fn publish(
        &self,
        routing_key: &str,
        properties: MessageProperties,
        body: Bytes,
    ) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let core = self
            .inner
            .queues
            .read()
            .get(routing_key)
            .cloned()
            .ok_or_else(|| TransportError::UnknownQueue(routing_key.to_string()))?;

        core.tx
            .send(QueuedMessage { properties, body })
            .map_err(|_| TransportError::UnknownQueue(routing_key.to_string()))?;

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        debug!(queue = %routing_key, "Message published");
        Ok(())
    }

    fn messages_published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}
