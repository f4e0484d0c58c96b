//! # Vision-Relay Runtime
//!
//! The runnable entry point for the relay.
//!
//! ## Wiring
//!
//! ```text
//! input dir ──→ JobClient ──publish──→ [Broker: work queue]
//!                   ↑                        │ (prefetch = 1 each)
//!                   │                        ▼
//!                   │                  ImageWorker × N
//!                   │                        │
//!                   │                 GrayscaleProcessor
//!                   │                        │
//!             [reply queue] ←──publish───────┘
//!                   │
//!                   ▼
//!              output dir
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging
//! 2. Load configuration (environment overrides)
//! 3. Open the broker and spawn the worker pool
//! 4. Connect the client and submit every image in the input directory
//! 5. Write results, then shut down gracefully (client → workers → broker)

mod config;
mod processor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use relay_broker::MemoryBroker;
use relay_client::JobClient;
use relay_types::CallError;
use relay_worker::ImageWorker;

use crate::processor::GrayscaleProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = config::load();

    info!("===========================================");
    info!("  Vision-Relay Runtime v0.1.0");
    info!("===========================================");
    info!("Work queue: {}", config.relay.queue_name);
    info!("Workers: {}", config.workers);
    info!("Input dir: {:?}", config.input_dir);
    info!("Output dir: {:?}", config.output_dir);

    // Open the broker and spawn the worker pool.
    let broker = Arc::new(MemoryBroker::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = Vec::new();
    for _ in 0..config.workers {
        let worker = ImageWorker::new(
            Arc::clone(&broker),
            &config.relay,
            Arc::new(GrayscaleProcessor),
        )
        .context("Failed to attach worker")?;
        workers.push(tokio::spawn(worker.run_until(shutdown_rx.clone())));
    }

    let client = JobClient::connect(Arc::clone(&broker), config.relay.clone())
        .context("Failed to connect client")?;

    let images = enumerate_images(&config.input_dir)?;
    info!("Submitting {} image(s)", images.len());

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {:?}", config.output_dir)
    })?;

    let calls = images.into_iter().map(|path| {
        let client = &client;
        let output_dir = &config.output_dir;
        async move {
            let submitted = submit_image(client, output_dir, &path).await;
            (path, submitted)
        }
    });
    let outcomes = futures::future::join_all(calls).await;

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(()) => succeeded += 1,
            Err(e) => {
                failed += 1;
                error!(path = %path.display(), "{e:#}");
            }
        }
    }
    info!(succeeded, failed, "All jobs settled");

    // Graceful shutdown: client first, then workers, then the broker.
    client.close();
    let _ = shutdown_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }
    broker.close();

    Ok(())
}

/// Collect the files of the input directory.
fn enumerate_images(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read input directory {input_dir:?}"))?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    images.sort();

    if images.is_empty() {
        warn!("Input directory {:?} contains no files", input_dir);
    }
    Ok(images)
}

/// Submit one image and write the processed result.
async fn submit_image(client: &JobClient, output_dir: &Path, path: &Path) -> Result<()> {
    let input = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {path:?}"))?;

    info!(path = %path.display(), bytes = input.len(), "Requesting processing");

    let output = match client.call(Bytes::from(input)).await {
        Ok(output) => output,
        Err(CallError::ProcessingFailed) => {
            anyhow::bail!("Worker could not process the image")
        }
        Err(e) => return Err(e).context("Call failed"),
    };

    let file_name = path
        .file_name()
        .context("Input path has no file name")?;
    let target = output_dir.join(file_name);
    tokio::fs::write(&target, &output)
        .await
        .with_context(|| format!("Failed to write {target:?}"))?;

    info!(path = %target.display(), bytes = output.len(), "Result written");
    Ok(())
}
