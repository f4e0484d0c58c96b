//! # Worker Concurrency and Shutdown Behavior
//!
//! Verifies the single-in-flight constraint and the worker lifecycle:
//! the job processor is never invoked a second time before the prior
//! delivery reached a terminal state, and shutdown lets in-flight work
//! finish.

// =============================================================================
// TEST FIXTURES (only compiled during tests)
// =============================================================================

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
use relay_types::ProcessingError;

#[cfg(test)]
use relay_worker::JobProcessor;

/// Processor that records how many invocations overlap.
#[cfg(test)]
struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

#[cfg(test)]
impl ConcurrencyProbe {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        })
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl JobProcessor for ConcurrencyProbe {
    fn process(&self, input: &[u8]) -> Result<Vec<u8>, ProcessingError> {
        let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(input.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use relay_broker::MemoryBroker;
    use relay_client::JobClient;
    use relay_types::RelayConfig;
    use relay_worker::ImageWorker;
    use tokio::sync::watch;

    fn config() -> RelayConfig {
        RelayConfig::default().with_call_timeout(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_single_in_flight_per_worker() {
        let broker = Arc::new(MemoryBroker::new());
        let probe = ConcurrencyProbe::new(Duration::from_millis(20));

        let worker = ImageWorker::new(
            Arc::clone(&broker),
            &config(),
            Arc::clone(&probe) as Arc<dyn JobProcessor>,
        )
        .unwrap();
        tokio::spawn(worker.run());

        let client =
            Arc::new(JobClient::connect(Arc::clone(&broker), config()).unwrap());

        let calls = (0..6u8).map(|n| {
            let client = Arc::clone(&client);
            async move { client.call(Bytes::from(vec![n])).await }
        });
        let outcomes = futures::future::join_all(calls).await;

        for outcome in outcomes {
            outcome.expect("call resolves");
        }
        // Never a second invocation before the prior delivery settled.
        assert_eq!(probe.peak(), 1);
    }

    #[tokio::test]
    async fn test_two_workers_split_the_queue() {
        let broker = Arc::new(MemoryBroker::new());
        let probe = ConcurrencyProbe::new(Duration::from_millis(10));

        let mut worker_stats = Vec::new();
        for _ in 0..2 {
            let worker = ImageWorker::new(
                Arc::clone(&broker),
                &config(),
                Arc::clone(&probe) as Arc<dyn JobProcessor>,
            )
            .unwrap();
            worker_stats.push(worker.stats());
            tokio::spawn(worker.run());
        }

        let client =
            Arc::new(JobClient::connect(Arc::clone(&broker), config()).unwrap());

        let calls = (0..6u8).map(|n| {
            let client = Arc::clone(&client);
            async move { client.call(Bytes::from(vec![n])).await }
        });
        for outcome in futures::future::join_all(calls).await {
            outcome.expect("call resolves");
        }

        // Every job was processed exactly once across the pool, and each
        // worker stayed within its own single-concurrency bound.
        let processed: u64 = worker_stats
            .iter()
            .map(|stats| stats.processed.load(Ordering::Relaxed))
            .sum();
        assert_eq!(processed, 6);
        assert!(probe.peak() <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_finishes_in_flight_job() {
        let broker = Arc::new(MemoryBroker::new());
        let probe = ConcurrencyProbe::new(Duration::from_millis(50));

        let worker = ImageWorker::new(
            Arc::clone(&broker),
            &config(),
            Arc::clone(&probe) as Arc<dyn JobProcessor>,
        )
        .unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker_task = tokio::spawn(worker.run_until(shutdown_rx));

        let client =
            Arc::new(JobClient::connect(Arc::clone(&broker), config()).unwrap());

        let caller = Arc::clone(&client);
        let call = tokio::spawn(async move { caller.call(Bytes::from_static(b"job")).await });

        // Signal shutdown while the job is being processed.
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();

        // The in-flight job completes and is answered before the worker
        // stops.
        let result = tokio::time::timeout(Duration::from_secs(1), call)
            .await
            .expect("call settles")
            .unwrap();
        assert_eq!(result.unwrap().as_ref(), b"job");

        tokio::time::timeout(Duration::from_secs(1), worker_task)
            .await
            .expect("worker stops after finishing in-flight work")
            .unwrap();
    }

    #[tokio::test]
    async fn test_worker_stops_when_broker_closes() {
        let broker = Arc::new(MemoryBroker::new());
        let worker = ImageWorker::new(
            Arc::clone(&broker),
            &config(),
            Arc::new(|input: &[u8]| -> Result<Vec<u8>, ProcessingError> {
                Ok(input.to_vec())
            }),
        )
        .unwrap();
        let worker_task = tokio::spawn(worker.run());

        broker.close();

        tokio::time::timeout(Duration::from_secs(1), worker_task)
            .await
            .expect("worker stops when the broker closes")
            .unwrap();
    }
}
