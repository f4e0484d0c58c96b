//! # Runtime Configuration
//!
//! Relay configuration plus the directory layout of the demo flow.
//! All values have sane defaults with environment override capability.

use relay_types::RelayConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Queue and timeout settings shared with the client and workers.
    pub relay: RelayConfig,
    /// Directory of images to submit.
    pub input_dir: PathBuf,
    /// Directory processed images are written to.
    pub output_dir: PathBuf,
    /// Number of worker processes to emulate (each a single-concurrency
    /// unit).
    pub workers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            input_dir: PathBuf::from("./img"),
            output_dir: PathBuf::from("./results"),
            workers: 1,
        }
    }
}

/// Load configuration from environment overrides.
pub fn load() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();

    if let Ok(queue) = std::env::var("VR_QUEUE") {
        config.relay.queue_name = queue;
    }
    if let Ok(dir) = std::env::var("VR_INPUT_DIR") {
        config.input_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("VR_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    if let Ok(workers) = std::env::var("VR_WORKERS") {
        match workers.parse() {
            Ok(n) if n > 0 => config.workers = n,
            _ => warn!("VR_WORKERS must be a positive integer"),
        }
    }
    if let Ok(timeout_ms) = std::env::var("VR_CALL_TIMEOUT_MS") {
        match timeout_ms.parse() {
            Ok(ms) => config.relay.call_timeout = Duration::from_millis(ms),
            Err(_) => warn!("VR_CALL_TIMEOUT_MS must be milliseconds"),
        }
    }

    config
}
