//! Indexer refresh after the query container changes.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::types::{PipelineError, RefreshOutcome, Stage};
use crate::search::{SearchIndex, SearchIndexError};

/// Resets and re-runs the indexer that crawls the query container.
pub struct IndexRefresher {
    index: Arc<dyn SearchIndex>,
    indexer_name: String,
    settle_delay: Duration,
}

impl IndexRefresher {
    /// Refresher for `indexer_name`, pausing `settle_delay` after each accepted run.
    pub fn new(index: Arc<dyn SearchIndex>, indexer_name: &str, settle_delay: Duration) -> Self {
        Self {
            index,
            indexer_name: indexer_name.to_string(),
            settle_delay,
        }
    }

    /// Request a full re-crawl.
    ///
    /// Throttling is not an error: it is logged and reported as [`RefreshOutcome::Throttled`],
    /// and the settle delay is skipped. Any other search failure is returned.
    pub async fn trigger(&self) -> Result<RefreshOutcome, PipelineError> {
        match self.reset_and_run().await {
            Ok(()) => {
                info!(indexer = %self.indexer_name, "Indexer refresh requested");
                if !self.settle_delay.is_zero() {
                    tokio::time::sleep(self.settle_delay).await;
                }
                Ok(RefreshOutcome::Requested)
            }
            Err(SearchIndexError::Throttled(message)) => {
                warn!(
                    indexer = %self.indexer_name,
                    message = %message,
                    "Indexer refresh throttled; index may lag behind storage"
                );
                Ok(RefreshOutcome::Throttled { message })
            }
            Err(source) => Err(PipelineError::search(Stage::Refresh, source)),
        }
    }

    async fn reset_and_run(&self) -> Result<(), SearchIndexError> {
        self.index.get_indexer(&self.indexer_name).await?;
        self.index.reset_indexer(&self.indexer_name).await?;
        self.index.run_indexer(&self.indexer_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::RecordingIndex;

    fn refresher(index: &Arc<RecordingIndex>) -> IndexRefresher {
        IndexRefresher::new(index.clone(), "doc-indexer", Duration::ZERO)
    }

    #[tokio::test]
    async fn checks_then_resets_then_runs() {
        let index = Arc::new(RecordingIndex::default());
        let outcome = refresher(&index).trigger().await.expect("refresh");
        assert_eq!(outcome, RefreshOutcome::Requested);
        assert_eq!(
            index.calls(),
            vec!["get:doc-indexer", "reset:doc-indexer", "run:doc-indexer"]
        );
    }

    #[tokio::test]
    async fn throttling_is_swallowed() {
        let index = Arc::new(RecordingIndex::throttled());
        let outcome = refresher(&index)
            .trigger()
            .await
            .expect("throttle is not fatal");
        let RefreshOutcome::Throttled { message } = outcome else {
            panic!("expected a throttled refresh");
        };
        assert!(message.contains("Too many"));
    }

    #[tokio::test]
    async fn missing_indexer_is_an_error() {
        let index = Arc::new(RecordingIndex::missing_indexer());
        let error = refresher(&index)
            .trigger()
            .await
            .expect_err("missing indexer");
        assert!(matches!(
            error,
            PipelineError::Search {
                stage: Stage::Refresh,
                source: SearchIndexError::IndexerNotFound(_)
            }
        ));
        assert_eq!(index.calls(), vec!["get:doc-indexer"]);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_settle_delay_after_accepted_run() {
        let index = Arc::new(RecordingIndex::default());
        let refresher =
            IndexRefresher::new(index.clone(), "doc-indexer", Duration::from_millis(1_500));
        let started = tokio::time::Instant::now();
        refresher.trigger().await.expect("refresh");
        assert!(started.elapsed() >= Duration::from_millis(1_500));
    }
}
