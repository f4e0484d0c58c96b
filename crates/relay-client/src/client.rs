//! Client runtime: issues calls over the broker and routes responses back
//! through the pending call table.

use crate::pending::{CallReply, PendingCallTable, PendingStats};
use bytes::Bytes;
use relay_broker::{BrokerPublisher, MemoryBroker, QueueSpec, SubscribeOptions, Subscription};
use relay_types::{
    CallError, CorrelationId, JobRequest, JobResponse, RelayConfig, ReplyAddress, TransportError,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Removes the pending entry when a call future is dropped before reaching
/// a terminal state, so abandoned calls cannot leak table entries.
struct CallGuard<'a> {
    table: &'a PendingCallTable,
    id: CorrelationId,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        // No-op when the call already resolved or was cancelled.
        self.table.cancel(&self.id);
    }
}

/// Client runtime for issuing image-processing calls.
///
/// Construction declares the work queue and a private, exclusive,
/// auto-deleting reply queue, subscribes to the reply queue once, and
/// spawns the response listener. All calls of the instance multiplex over
/// that one reply queue, discriminated solely by correlation id.
///
/// Disposing the client (drop or [`close`]) stops the listener and
/// completes every outstanding call with [`CallError::TransportClosed`].
///
/// [`close`]: JobClient::close
pub struct JobClient {
    broker: Arc<MemoryBroker>,
    config: RelayConfig,
    reply_to: ReplyAddress,
    pending: Arc<PendingCallTable>,
    listener: JoinHandle<()>,
}

impl JobClient {
    /// Connect a client to the broker.
    ///
    /// # Errors
    ///
    /// [`TransportError`] when the broker is closed or the reply queue
    /// cannot be created.
    pub fn connect(
        broker: Arc<MemoryBroker>,
        config: RelayConfig,
    ) -> Result<Self, TransportError> {
        broker.declare_queue(QueueSpec::work_queue(&config.queue_name))?;
        let reply_queue = broker.declare_queue(QueueSpec::reply_queue())?;
        let subscription = broker.subscribe(&reply_queue, SubscribeOptions::auto_ack())?;

        let pending = Arc::new(PendingCallTable::new());
        let listener = tokio::spawn(Self::listen(subscription, Arc::clone(&pending)));

        debug!(reply_queue = %reply_queue, queue = %config.queue_name, "Client connected");

        Ok(Self {
            broker,
            config,
            reply_to: ReplyAddress::new(reply_queue),
            pending,
            listener,
        })
    }

    /// Response listener: resolves pending calls as replies arrive.
    ///
    /// Runs until the broker closes, then drains the table so no caller
    /// blocks forever.
    #[instrument(skip_all, name = "reply_listener")]
    async fn listen(mut subscription: Subscription, pending: Arc<PendingCallTable>) {
        debug!(queue = subscription.queue_name(), "Listening for responses");

        while let Some(delivery) = subscription.recv().await {
            match JobResponse::from_message(delivery.properties(), delivery.body().clone()) {
                // A response nobody is waiting for is dropped inside
                // `resolve`, counted, and never an error.
                Ok(response) => {
                    pending.resolve(response);
                }
                Err(e) => {
                    warn!(error = %e, "Response without correlation id dropped");
                }
            }
        }

        debug!("Broker closed, draining outstanding calls");
        pending.drain_all(CallError::TransportClosed);
    }

    /// Issue a call with the configured default timeout.
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn call(&self, payload: impl Into<Bytes>) -> Result<Bytes, CallError> {
        let timeout = self.config.call_timeout;
        self.call_with_timeout(payload, timeout).await
    }

    /// Issue a call with an explicit timeout.
    ///
    /// # Errors
    ///
    /// See [`CallError`].
    pub async fn call_with_timeout(
        &self,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Bytes, CallError> {
        self.call_with_cancel(payload, timeout, std::future::pending::<()>())
            .await
    }

    /// Issue a call racing a caller-supplied cancellation future.
    ///
    /// The call suspends until the response arrives, the timeout elapses,
    /// or `cancel` completes, whichever occurs first; the other
    /// completions become no-ops. Cancellation is cooperative: a request
    /// already in flight is still processed by a worker, and its eventual
    /// response is silently dropped.
    ///
    /// # Errors
    ///
    /// - [`CallError::PublishFailed`]: the transport rejected the publish;
    ///   no pending call is left registered.
    /// - [`CallError::TimedOut`] / [`CallError::Canceled`]: the timer or
    ///   the cancellation signal won the race.
    /// - [`CallError::ProcessingFailed`]: the worker reported failure.
    /// - [`CallError::TransportClosed`]: the runtime was disposed or the
    ///   broker closed while the call was outstanding.
    pub async fn call_with_cancel(
        &self,
        payload: impl Into<Bytes>,
        timeout: Duration,
        cancel: impl Future<Output = ()>,
    ) -> Result<Bytes, CallError> {
        let id = CorrelationId::new();
        let mut rx = self.pending.register(id)?;
        // Registration precedes publish, so a response can never race an
        // unregistered id. The guard releases the entry if this future is
        // dropped mid-call.
        let _guard = CallGuard {
            table: &self.pending,
            id,
        };

        let request = JobRequest::new(id, self.reply_to.clone(), payload.into());
        let properties = request.properties();
        if let Err(e) = self
            .broker
            .publish(&self.config.queue_name, properties, request.body)
            .await
        {
            return Err(CallError::PublishFailed(e));
        }

        tokio::pin!(cancel);
        let sleep = tokio::time::sleep(timeout);
        tokio::pin!(sleep);

        tokio::select! {
            reply = &mut rx => match reply {
                Ok(reply) => reply,
                Err(_) => Err(CallError::TransportClosed),
            },
            () = &mut sleep => self.abandon(id, &mut rx, CallError::TimedOut),
            () = &mut cancel => self.abandon(id, &mut rx, CallError::Canceled),
        }
    }

    /// Terminate a call from the caller's side (timeout or cancellation).
    ///
    /// If the response resolved the entry first, first-writer-wins applies
    /// and the resolved reply is returned instead of `outcome`.
    fn abandon(
        &self,
        id: CorrelationId,
        rx: &mut oneshot::Receiver<CallReply>,
        outcome: CallError,
    ) -> Result<Bytes, CallError> {
        if self.pending.cancel(&id) {
            debug!(correlation_id = %id, outcome = %outcome, "Call abandoned");
            return Err(outcome);
        }
        match rx.try_recv() {
            Ok(reply) => reply,
            Err(_) => Err(outcome),
        }
    }

    /// The private reply queue all calls of this instance share.
    #[must_use]
    pub fn reply_address(&self) -> &ReplyAddress {
        &self.reply_to
    }

    /// Number of calls currently awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    /// Correlation table statistics.
    #[must_use]
    pub fn stats(&self) -> Arc<PendingStats> {
        self.pending.stats()
    }

    /// Dispose the client: stop the response listener, release the reply
    /// queue, and complete every outstanding call with
    /// [`CallError::TransportClosed`].
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for JobClient {
    fn drop(&mut self) {
        self.listener.abort();
        let drained = self.pending.drain_all(CallError::TransportClosed);
        if drained > 0 {
            warn!(drained = drained, "Client disposed with outstanding calls");
        }
    }
}
