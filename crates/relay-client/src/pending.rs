//! Pending Call Table - the correlation table of the client runtime.
//!
//! Maps correlation ids to single-assignment result slots for calls
//! awaiting their broker response.

use bytes::Bytes;
use dashmap::DashMap;
use relay_types::{CallError, CorrelationId, JobOutcome, JobResponse};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// The value written into a call's result slot: the processed payload, or
/// the error that terminated the call.
pub type CallReply = Result<Bytes, CallError>;

/// A call registered in the table, waiting for its terminal resolution.
struct PendingCall {
    /// Single-assignment slot the caller awaits.
    sender: oneshot::Sender<CallReply>,
    /// When the call was registered.
    issued_at: Instant,
}

/// Statistics for the pending call table.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total calls registered.
    pub registered: AtomicU64,
    /// Calls completed by a matching response.
    pub resolved: AtomicU64,
    /// Calls removed by cancellation or timeout.
    pub cancelled: AtomicU64,
    /// Calls completed by a shutdown drain.
    pub drained: AtomicU64,
    /// Responses dropped because no call was pending under their id.
    pub dropped_responses: AtomicU64,
}

/// Thread-safe correlation table with atomic, exactly-once resolution.
///
/// `register`, `resolve` and `cancel` are linearizable per key through the
/// map's atomic remove semantics: whichever completion removes the entry
/// first wins, and the losing completion becomes a no-op.
pub struct PendingCallTable {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: Arc<PendingStats>,
}

impl PendingCallTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a fresh pending call under `id` and get the receiver for
    /// its result slot.
    ///
    /// # Errors
    ///
    /// [`CallError::DuplicateCorrelationId`] when a call is already pending
    /// under `id`. Id generation makes this unreachable in practice, but it
    /// is checked, not assumed: a collision means a local bug.
    pub fn register(
        &self,
        id: CorrelationId,
    ) -> Result<oneshot::Receiver<CallReply>, CallError> {
        use dashmap::mapref::entry::Entry;

        let (tx, rx) = oneshot::channel();
        match self.pending.entry(id) {
            Entry::Occupied(_) => {
                error!(correlation_id = %id, "Correlation id collision on register");
                Err(CallError::DuplicateCorrelationId(id))
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingCall {
                    sender: tx,
                    issued_at: Instant::now(),
                });
                self.stats.registered.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %id, "Registered pending call");
                Ok(rx)
            }
        }
    }

    /// Complete the pending call matching a response.
    ///
    /// Returns `false` (a counted no-op) when no call is pending under the
    /// response's id: it already timed out, was canceled, or this is a
    /// stray duplicate.
    pub fn resolve(&self, response: JobResponse) -> bool {
        let id = response.correlation_id;
        let Some((_, call)) = self.pending.remove(&id) else {
            self.stats.dropped_responses.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %id,
                "Response for unknown correlation id dropped"
            );
            return false;
        };

        let reply = match response.outcome {
            JobOutcome::Completed(output) => Ok(output),
            JobOutcome::Failed => Err(CallError::ProcessingFailed),
        };

        let elapsed = call.issued_at.elapsed();
        match call.sender.send(reply) {
            Ok(()) => {
                self.stats.resolved.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %id,
                    elapsed_ms = elapsed.as_millis(),
                    "Resolved pending call"
                );
                true
            }
            Err(_) => {
                // The caller abandoned the receiver after the entry was
                // removed but before the send; treated as resolved.
                debug!(correlation_id = %id, "Pending call receiver dropped");
                true
            }
        }
    }

    /// Remove a pending call on cancellation or timeout.
    ///
    /// Returns `false` when the call was already resolved (the response won
    /// the race).
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        if self.pending.remove(id).is_some() {
            self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %id, "Cancelled pending call");
            true
        } else {
            false
        }
    }

    /// Complete every remaining entry with `error`.
    ///
    /// Used at shutdown so no caller blocks forever. Returns the number of
    /// calls drained.
    pub fn drain_all(&self, error: CallError) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut drained = 0;
        for id in ids {
            if let Some((_, call)) = self.pending.remove(&id) {
                let _ = call.sender.send(Err(error.clone()));
                drained += 1;
            }
        }
        if drained > 0 {
            self.stats.drained.fetch_add(drained as u64, Ordering::Relaxed);
            warn!(drained = drained, error = %error, "Drained outstanding calls");
        }
        drained
    }

    /// Number of currently pending calls.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a call is pending under `id`.
    #[must_use]
    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.pending.contains_key(id)
    }

    /// Shared statistics handle.
    #[must_use]
    pub fn stats(&self) -> Arc<PendingStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for PendingCallTable {
    fn default() -> Self {
        Self::new()
    }
}
