use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Counters for the round pipeline, logged periodically.
#[derive(Debug, Default)]
pub struct RelayerMetrics {
    pub rounds_processed: AtomicU64,
    pub rounds_empty: AtomicU64,
    pub rounds_matched: AtomicU64,
    pub roots_posted: AtomicU64,
    pub roots_locked: AtomicU64,
    pub match_failures: AtomicU64,
    pub post_failures: AtomicU64,
    pub rounds_abandoned: AtomicU64,
    /// Errors since the last success; backoff input and alerting signal.
    pub consecutive_errors: AtomicU64,
}

impl RelayerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
    }

    pub fn record_error(&self) -> u64 {
        self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn log_summary(&self) {
        info!(
            "Relayer: processed={} matched={} empty={} roots_posted={} locked={} match_failures={} post_failures={} abandoned={} consecutive_errors={}",
            self.rounds_processed.load(Ordering::Relaxed),
            self.rounds_matched.load(Ordering::Relaxed),
            self.rounds_empty.load(Ordering::Relaxed),
            self.roots_posted.load(Ordering::Relaxed),
            self.roots_locked.load(Ordering::Relaxed),
            self.match_failures.load(Ordering::Relaxed),
            self.post_failures.load(Ordering::Relaxed),
            self.rounds_abandoned.load(Ordering::Relaxed),
            self.consecutive_errors.load(Ordering::Relaxed),
        );
    }
}
