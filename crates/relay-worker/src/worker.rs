//! Worker runtime: the single-delivery processing loop.

use crate::processor::JobProcessor;
use crate::WORKER_PREFETCH;
use bytes::Bytes;
use relay_broker::{BrokerPublisher, Delivery, MemoryBroker, QueueSpec, SubscribeOptions, Subscription};
use relay_types::{JobRequest, JobResponse, ProcessingError, RelayConfig, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Statistics for one worker instance.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Jobs processed successfully.
    pub processed: AtomicU64,
    /// Jobs whose processor reported failure (still answered).
    pub failed: AtomicU64,
    /// Deliveries discarded for a malformed envelope.
    pub malformed: AtomicU64,
    /// Replies that could not be published (caller's queue gone).
    pub undeliverable_replies: AtomicU64,
}

/// Worker runtime consuming the well-known work queue.
///
/// Subscribes with manual acknowledgment and an in-flight limit of one:
/// the job processor is never invoked again before the previous delivery
/// reached a terminal state. The limit is a design choice (one loaded
/// model instance per process), not an incidental default.
pub struct ImageWorker {
    broker: Arc<MemoryBroker>,
    processor: Arc<dyn JobProcessor>,
    subscription: Subscription,
    queue_name: String,
    stats: Arc<WorkerStats>,
}

impl ImageWorker {
    /// Attach a worker to the work queue.
    ///
    /// # Errors
    ///
    /// [`TransportError`] when the broker is closed or the queue cannot be
    /// declared.
    pub fn new(
        broker: Arc<MemoryBroker>,
        config: &RelayConfig,
        processor: Arc<dyn JobProcessor>,
    ) -> Result<Self, TransportError> {
        broker.declare_queue(QueueSpec::work_queue(&config.queue_name))?;
        let subscription = broker.subscribe(
            &config.queue_name,
            SubscribeOptions::manual_ack(WORKER_PREFETCH),
        )?;

        Ok(Self {
            broker,
            processor,
            subscription,
            queue_name: config.queue_name.clone(),
            stats: Arc::new(WorkerStats::default()),
        })
    }

    /// Shared statistics handle.
    #[must_use]
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Process deliveries until the broker closes.
    ///
    /// Should be spawned as a background task.
    #[instrument(skip(self), name = "image_worker", fields(queue = %self.queue_name))]
    pub async fn run(mut self) {
        info!("Awaiting job requests");
        while let Some(delivery) = self.subscription.recv().await {
            self.handle_delivery(delivery).await;
        }
        info!("Broker closed, worker stopping");
    }

    /// Process deliveries until the broker closes or `shutdown` fires.
    ///
    /// On shutdown the worker stops accepting new deliveries; a delivery
    /// already being processed completes (and is acknowledged) first.
    #[instrument(skip(self, shutdown), name = "image_worker", fields(queue = %self.queue_name))]
    pub async fn run_until(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Awaiting job requests");
        loop {
            let delivery = tokio::select! {
                delivery = self.subscription.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => {
                        info!("Broker closed, worker stopping");
                        return;
                    }
                },
                _ = shutdown.changed() => {
                    info!("Shutdown signal received, worker stopping");
                    return;
                }
            };
            self.handle_delivery(delivery).await;
        }
    }

    /// Drive one delivery through the per-message state machine.
    ///
    /// Terminal states: acknowledged (well-formed, answered) or discarded
    /// (malformed, unanswerable). The acknowledgment happens after the
    /// reply publish attempt, regardless of processing outcome; a fault on
    /// the way is covered by the delivery handle's drop cleanup, so the
    /// single in-flight slot can never be stalled.
    async fn handle_delivery(&self, delivery: Delivery) {
        let request = match JobRequest::from_message(delivery.properties(), delivery.body().clone())
        {
            Ok(request) => request,
            Err(e) => {
                // No reply address means no response is possible; requeueing
                // would loop a permanently malformed message forever.
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Malformed job envelope discarded");
                delivery.reject(false);
                return;
            }
        };

        debug!(
            correlation_id = %request.correlation_id,
            input_bytes = request.body.len(),
            "Processing job"
        );

        let response = match self.invoke_processor(request.body.clone()).await {
            Ok(output) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                JobResponse::completed(request.correlation_id, output)
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    correlation_id = %request.correlation_id,
                    error = %e,
                    "Job processing failed, answering with failure response"
                );
                JobResponse::failed(request.correlation_id)
            }
        };

        let (properties, body) = response.into_wire();
        if let Err(e) = self
            .broker
            .publish(request.reply_to.as_str(), properties, body)
            .await
        {
            self.stats.undeliverable_replies.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %request.correlation_id,
                reply_to = %request.reply_to,
                error = %e,
                "Reply undeliverable, caller is gone"
            );
        }

        delivery.ack();
    }

    /// Invoke the processor on a blocking thread.
    ///
    /// A processor panic is contained here and reported as a failure, so
    /// the delivery still reaches its terminal state.
    async fn invoke_processor(&self, input: Bytes) -> Result<Bytes, ProcessingError> {
        let processor = Arc::clone(&self.processor);
        match tokio::task::spawn_blocking(move || processor.process(&input)).await {
            Ok(result) => result.map(Bytes::from),
            Err(join_error) if join_error.is_panic() => Err(ProcessingError::Panicked),
            Err(join_error) => Err(ProcessingError::Failed(join_error.to_string())),
        }
    }
}
