use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing document lifecycle and query activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_uploaded: AtomicU64,
    uploads_rejected: AtomicU64,
    documents_promoted: AtomicU64,
    promotion_failures: AtomicU64,
    refreshes_requested: AtomicU64,
    refreshes_throttled: AtomicU64,
    documents_cleared: AtomicU64,
    questions_answered: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an upload that stored a new document.
    pub fn record_upload(&self) {
        self.documents_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload rejected because the name was already staged.
    pub fn record_rejected_upload(&self) {
        self.uploads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the per-document results of one promotion batch.
    pub fn record_promotion(&self, promoted: u64, failed: u64) {
        self.documents_promoted
            .fetch_add(promoted, Ordering::Relaxed);
        self.promotion_failures.fetch_add(failed, Ordering::Relaxed);
    }

    /// Record an index refresh request and whether the backend throttled it.
    pub fn record_refresh(&self, throttled: bool) {
        if throttled {
            self.refreshes_throttled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.refreshes_requested.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record documents removed from the query container by a reset.
    pub fn record_reset(&self, cleared: u64) {
        self.documents_cleared.fetch_add(cleared, Ordering::Relaxed);
    }

    /// Record a question that produced an answer.
    pub fn record_answer(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_uploaded: self.documents_uploaded.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            documents_promoted: self.documents_promoted.load(Ordering::Relaxed),
            promotion_failures: self.promotion_failures.load(Ordering::Relaxed),
            refreshes_requested: self.refreshes_requested.load(Ordering::Relaxed),
            refreshes_throttled: self.refreshes_throttled.load(Ordering::Relaxed),
            documents_cleared: self.documents_cleared.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents stored in the staging container since startup.
    pub documents_uploaded: u64,
    /// Uploads rejected because the name already existed.
    pub uploads_rejected: u64,
    /// Documents whose copy into the query container succeeded.
    pub documents_promoted: u64,
    /// Documents whose promotion ended in a failure outcome.
    pub promotion_failures: u64,
    /// Indexer refreshes accepted by the search backend.
    pub refreshes_requested: u64,
    /// Indexer refreshes rejected by throttling.
    pub refreshes_throttled: u64,
    /// Documents deleted from the query container by resets.
    pub documents_cleared: u64,
    /// Questions answered by the query pipeline.
    pub questions_answered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_promotions_and_refreshes() {
        let metrics = PipelineMetrics::new();
        metrics.record_promotion(2, 1);
        metrics.record_promotion(3, 0);
        metrics.record_refresh(false);
        metrics.record_refresh(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_promoted, 5);
        assert_eq!(snapshot.promotion_failures, 1);
        assert_eq!(snapshot.refreshes_requested, 1);
        assert_eq!(snapshot.refreshes_throttled, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
