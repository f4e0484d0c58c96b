//! # Relay Configuration
//!
//! Shared configuration for the client and worker runtimes.
//! All values have sane defaults with override capability.

use std::time::Duration;

/// Well-known work queue name used when none is configured.
pub const DEFAULT_WORK_QUEUE: &str = "image_jobs";

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a relay client or worker instance.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Well-known work queue the workers consume from.
    pub queue_name: String,
    /// Broker address. Informational for the in-memory broker; an AMQP
    /// transport would dial it.
    pub broker_addr: String,
    /// Timeout applied by `JobClient::call` when the caller does not pass
    /// one explicitly.
    pub call_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_WORK_QUEUE.to_string(),
            broker_addr: "localhost".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl RelayConfig {
    /// Override the work queue name.
    #[must_use]
    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Override the default call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}
