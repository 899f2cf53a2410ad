use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ScanError;

/// Upper bound on slots, whatever the request asks for.
pub const MAX_CONCURRENCY: usize = 5_000;

/// Counting gate for in-flight probes.
///
/// Backed by tokio's semaphore, which admits waiters in FIFO order, so a waiting
/// probe is never starved while slots keep freeing up.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    sem: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_CONCURRENCY);
        Self {
            sem: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.sem.available_permits()
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ScanError> {
        self.sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ScanError::Session(format!("concurrency limiter closed: {e}")))
    }
}
