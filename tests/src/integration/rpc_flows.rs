//! # Call Lifecycle Scenarios
//!
//! Exercises the full client ↔ broker ↔ worker round trip:
//!
//! ```text
//! JobClient ──request──→ [work queue] ──→ ImageWorker ──→ JobProcessor
//!     ↑                                        │
//!     └──────────── [reply queue] ←──response──┘
//! ```
//!
//! ## Scenario Categories
//!
//! 1. **Happy Path**: request resolves with the processed payload
//! 2. **Failure**: a failed job still answers, well before the timeout
//! 3. **Timeout / Cancel**: the call terminates locally; the late response
//!    is received and silently dropped
//! 4. **Transport Close**: no caller is left hanging
//! 5. **Malformed Envelope**: discarded without a retry loop

// =============================================================================
// TEST FIXTURES (only compiled during tests)
// =============================================================================

#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
use bytes::Bytes;

#[cfg(test)]
use relay_broker::{BrokerPublisher, MemoryBroker};

#[cfg(test)]
use relay_client::JobClient;

#[cfg(test)]
use relay_types::{ProcessingError, RelayConfig};

#[cfg(test)]
use relay_worker::{ImageWorker, JobProcessor, WorkerStats};

#[cfg(test)]
use tokio::sync::watch;

/// One-process relay: broker, one worker, one client.
#[cfg(test)]
struct RelayHarness {
    broker: Arc<MemoryBroker>,
    client: Arc<JobClient>,
    worker_stats: Arc<WorkerStats>,
    shutdown_tx: watch::Sender<bool>,
}

#[cfg(test)]
impl RelayHarness {
    fn start(processor: Arc<dyn JobProcessor>, call_timeout: Duration) -> Self {
        let broker = Arc::new(MemoryBroker::new());
        let config = RelayConfig::default().with_call_timeout(call_timeout);

        let worker = ImageWorker::new(Arc::clone(&broker), &config, processor)
            .expect("worker attaches");
        let worker_stats = worker.stats();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(worker.run_until(shutdown_rx));

        let client = Arc::new(
            JobClient::connect(Arc::clone(&broker), config).expect("client connects"),
        );

        Self {
            broker,
            client,
            worker_stats,
            shutdown_tx,
        }
    }
}

/// Uppercases its input.
#[cfg(test)]
fn uppercase_processor() -> Arc<dyn JobProcessor> {
    Arc::new(|input: &[u8]| -> Result<Vec<u8>, ProcessingError> {
        Ok(input.to_ascii_uppercase())
    })
}

/// Sleeps for `delay`, then echoes its input.
#[cfg(test)]
fn slow_echo_processor(delay: Duration) -> Arc<dyn JobProcessor> {
    Arc::new(move |input: &[u8]| -> Result<Vec<u8>, ProcessingError> {
        std::thread::sleep(delay);
        Ok(input.to_vec())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::{CallError, CorrelationId, MessageProperties};
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    #[tokio::test]
    async fn test_happy_path() {
        let harness = RelayHarness::start(uppercase_processor(), Duration::from_secs(5));

        let started = Instant::now();
        let result = harness
            .client
            .call(Bytes::from_static(b"image bytes a"))
            .await
            .expect("call resolves");

        assert_eq!(result.as_ref(), b"IMAGE BYTES A");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(harness.worker_stats.processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_failure_still_answers() {
        // A processor that always fails for this input must produce a
        // failure response within normal processing latency, not a timeout.
        let harness = RelayHarness::start(
            Arc::new(|_: &[u8]| -> Result<Vec<u8>, ProcessingError> {
                Err(ProcessingError::Failed("no objects found".into()))
            }),
            Duration::from_secs(5),
        );

        let started = Instant::now();
        let result = harness.client.call(Bytes::from_static(b"image")).await;

        assert_eq!(result, Err(CallError::ProcessingFailed));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_empty_success_distinct_from_failure() {
        let harness = RelayHarness::start(
            Arc::new(|_: &[u8]| -> Result<Vec<u8>, ProcessingError> { Ok(Vec::new()) }),
            Duration::from_secs(5),
        );

        let result = harness
            .client
            .call(Bytes::from_static(b"image"))
            .await
            .expect("empty output is a success");
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_then_late_response_dropped() {
        let harness = RelayHarness::start(
            slow_echo_processor(Duration::from_millis(100)),
            Duration::from_secs(5),
        );

        let result = harness
            .client
            .call_with_timeout(Bytes::from_static(b"image bytes b"), Duration::from_millis(1))
            .await;
        assert_eq!(result, Err(CallError::TimedOut));
        assert_eq!(harness.client.pending_count(), 0);

        // The worker still processes the request; its late response reaches
        // the reply subscription and is dropped there, never surfaced.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let stats = harness.client.stats();
        assert_eq!(stats.dropped_responses.load(Ordering::Relaxed), 1);
        assert_eq!(harness.worker_stats.processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_cancel_then_late_response_dropped() {
        let harness = RelayHarness::start(
            slow_echo_processor(Duration::from_millis(100)),
            Duration::from_secs(5),
        );

        let result = harness
            .client
            .call_with_cancel(
                Bytes::from_static(b"image"),
                Duration::from_secs(5),
                tokio::time::sleep(Duration::from_millis(10)),
            )
            .await;
        assert_eq!(result, Err(CallError::Canceled));

        tokio::time::sleep(Duration::from_millis(300)).await;
        let stats = harness.client.stats();
        assert_eq!(stats.dropped_responses.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_transport_close_frees_caller_within_bounded_delay() {
        let harness = RelayHarness::start(
            slow_echo_processor(Duration::from_millis(200)),
            Duration::from_secs(30),
        );

        let client = Arc::clone(&harness.client);
        let call =
            tokio::spawn(async move { client.call(Bytes::from_static(b"image")).await });

        // Close the broker while the call is outstanding.
        tokio::time::sleep(Duration::from_millis(20)).await;
        harness.broker.close();

        let result = tokio::time::timeout(Duration::from_secs(1), call)
            .await
            .expect("caller must not hang")
            .unwrap();
        assert_eq!(result, Err(CallError::TransportClosed));
    }

    #[tokio::test]
    async fn test_concurrent_calls_multiplex_one_reply_queue() {
        let harness = RelayHarness::start(uppercase_processor(), Duration::from_secs(5));

        let calls = (0..8).map(|n| {
            let client = Arc::clone(&harness.client);
            async move {
                let payload = format!("image-{n}");
                let result = client.call(Bytes::from(payload.clone())).await;
                (payload, result)
            }
        });
        let outcomes = futures::future::join_all(calls).await;

        for (payload, result) in outcomes {
            let result = result.expect("call resolves");
            assert_eq!(result, Bytes::from(payload.to_ascii_uppercase()));
        }

        let stats = harness.client.stats();
        assert_eq!(stats.registered.load(Ordering::Relaxed), 8);
        assert_eq!(stats.resolved.load(Ordering::Relaxed), 8);
        assert_eq!(stats.dropped_responses.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_malformed_message_discarded_worker_available() {
        let harness = RelayHarness::start(uppercase_processor(), Duration::from_secs(5));

        // A message with no correlation id and no reply address cannot be
        // answered; it is discarded without an acknowledgment retry loop.
        harness
            .broker
            .publish(
                &RelayConfig::default().queue_name,
                MessageProperties::default(),
                Bytes::from_static(b"junk"),
            )
            .await
            .unwrap();

        // A message with a correlation id but no reply address is equally
        // unanswerable.
        harness
            .broker
            .publish(
                &RelayConfig::default().queue_name,
                MessageProperties {
                    correlation_id: Some(CorrelationId::new()),
                    reply_to: None,
                    failed: false,
                },
                Bytes::from_static(b"junk"),
            )
            .await
            .unwrap();

        // The worker remains available for the next delivery.
        let result = harness
            .client
            .call(Bytes::from_static(b"real job"))
            .await
            .expect("worker still serves");
        assert_eq!(result.as_ref(), b"REAL JOB");
        assert_eq!(harness.worker_stats.malformed.load(Ordering::Relaxed), 2);
    }
}
