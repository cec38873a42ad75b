//! Quiescence wait before finalizing a recording session

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::config::QuiesceConfig;

/// Counter of requests currently in flight for the active recording session
///
/// Incremented at request-start and decremented at normal response-end only.
/// Error-terminated requests stay counted, consistent with their records
/// never being committed.
#[derive(Debug, Default)]
pub struct PendingRequests(AtomicUsize);

impl PendingRequests {
    /// Create a counter at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A request started
    pub fn begin(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// A request completed normally
    pub fn complete(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }

    /// Number of requests currently in flight
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wait until no requests are in flight, within a bounded poll budget
///
/// Polls the counter once per interval up to `max_polls` attempts, stopping
/// early at zero. Never fails: when the budget is exhausted the caller
/// proceeds and the persisted fixture may be missing slow interactions.
pub async fn wait_for_quiescence(pending: &PendingRequests, quiesce: &QuiesceConfig) {
    let mut polls = 0;
    while pending.count() > 0 && polls < quiesce.max_polls {
        polls += 1;
        debug!("waiting for {} pending request(s), poll {polls}", pending.count());
        tokio::time::sleep(quiesce.poll_interval()).await;
    }

    if pending.count() > 0 {
        warn!(
            "quiescence budget exhausted with {} request(s) still pending, persisting anyway",
            pending.count()
        );
    }
}
