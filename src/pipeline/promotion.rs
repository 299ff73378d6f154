//! Staging → query promotion.
//!
//! Each named document is copied server-side into the query container and polled until the copy
//! settles or its wait budget runs out. Per-document failures are recorded in the
//! [`PromotionReport`] instead of aborting the batch; only storage transport errors abort. Once
//! every copy is terminal the indexer is refreshed exactly once.

use std::sync::Arc;

use futures_util::{StreamExt, TryStreamExt, stream};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::refresh::IndexRefresher;
use super::types::{
    CopyPollPolicy, PipelineError, PromotedDocument, PromotionFailure, PromotionReport, Stage,
};
use crate::storage::{BlobStore, CopyHandle, CopyStatus};

/// Copies staged documents into the query container and refreshes the indexer.
pub struct DocumentPromotion {
    store: Arc<dyn BlobStore>,
    staging_container: String,
    query_container: String,
    poll: CopyPollPolicy,
    concurrency: usize,
    refresher: Arc<IndexRefresher>,
}

impl DocumentPromotion {
    /// Promotion between the two named containers.
    pub fn new(
        store: Arc<dyn BlobStore>,
        staging_container: &str,
        query_container: &str,
        poll: CopyPollPolicy,
        concurrency: usize,
        refresher: Arc<IndexRefresher>,
    ) -> Self {
        Self {
            store,
            staging_container: staging_container.to_string(),
            query_container: query_container.to_string(),
            poll,
            concurrency: concurrency.max(1),
            refresher,
        }
    }

    /// Promote `names` and return their outcomes in submission order.
    ///
    /// Staged documents are left in place. An empty batch is rejected before any storage call.
    pub async fn promote(&self, names: &[String]) -> Result<PromotionReport, PipelineError> {
        if names.is_empty() {
            return Err(PipelineError::InvalidInput(
                "promotion batch contains no document names".into(),
            ));
        }

        self.store
            .ensure_container(&self.query_container)
            .await
            .map_err(|source| {
                PipelineError::storage(Stage::EnsureContainer, &self.query_container, source)
            })?;

        info!(
            documents = names.len(),
            concurrency = self.concurrency,
            "Promoting staged documents"
        );

        let documents: Vec<PromotedDocument> = stream::iter(names.iter().cloned())
            .map(|name| async move { self.promote_one(&name).await })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let refresh = self.refresher.trigger().await?;
        let report = PromotionReport { documents, refresh };
        info!(
            promoted = report.promoted_count(),
            failed = report.failed_count(),
            refresh = ?report.refresh,
            "Promotion batch settled"
        );
        Ok(report)
    }

    async fn promote_one(&self, name: &str) -> Result<PromotedDocument, PipelineError> {
        let handle = match self
            .store
            .copy(&self.staging_container, name, &self.query_container)
            .await
        {
            Ok(handle) => handle,
            Err(source) if source.is_not_found() => {
                warn!(document = name, "Document is not staged; skipping");
                return Ok(PromotedDocument {
                    name: name.to_string(),
                    outcome: Err(PromotionFailure::SourceMissing),
                });
            }
            Err(source) => return Err(PipelineError::storage(Stage::Copy, name, source)),
        };

        let outcome = self.await_copy(&handle).await?;
        match &outcome {
            Ok(()) => debug!(document = name, "Copy completed"),
            Err(failure) => warn!(document = name, failure = %failure, "Copy did not complete"),
        }
        Ok(PromotedDocument {
            name: name.to_string(),
            outcome,
        })
    }

    async fn await_copy(
        &self,
        handle: &CopyHandle,
    ) -> Result<Result<(), PromotionFailure>, PipelineError> {
        let started = Instant::now();
        loop {
            let status = self.store.copy_status(handle).await.map_err(|source| {
                PipelineError::storage(Stage::CopyStatus, &handle.name, source)
            })?;

            match status {
                CopyStatus::Success => return Ok(Ok(())),
                CopyStatus::Failed(reason) => {
                    return Ok(Err(PromotionFailure::CopyFailed { reason }));
                }
                CopyStatus::Pending => {}
            }

            let waited = started.elapsed();
            if waited >= self.poll.timeout {
                return Ok(Err(PromotionFailure::CopyTimeout { waited }));
            }
            tokio::time::sleep(self.poll.interval.min(self.poll.timeout - waited)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::testing::{RecordingIndex, ScriptedStore};
    use crate::pipeline::types::RefreshOutcome;

    const STAGING: &str = "staging";
    const QUERY: &str = "query";

    fn promotion(
        store: &Arc<ScriptedStore>,
        index: &Arc<RecordingIndex>,
        concurrency: usize,
    ) -> DocumentPromotion {
        let refresher = Arc::new(IndexRefresher::new(index.clone(), "doc-indexer", Duration::ZERO));
        DocumentPromotion::new(
            store.clone(),
            STAGING,
            QUERY,
            CopyPollPolicy {
                interval: Duration::from_millis(500),
                timeout: Duration::from_secs(5),
            },
            concurrency,
            refresher,
        )
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn copies_every_document_and_refreshes_once() {
        let store = ScriptedStore::new();
        store.seed(STAGING, &["a.pdf", "b.pdf"]).await;
        let index = Arc::new(RecordingIndex::default());

        let report = promotion(&store, &index, 1)
            .promote(&names(&["a.pdf", "b.pdf"]))
            .await
            .expect("promotion");

        assert_eq!(report.promoted_count(), 2);
        assert_eq!(report.refresh, RefreshOutcome::Requested);
        assert_eq!(index.refresh_count(), 1);
        assert_eq!(
            store.list(QUERY).await.expect("list"),
            names(&["a.pdf", "b.pdf"])
        );
        assert_eq!(store.list(STAGING).await.expect("list").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_pending_copies_until_success() {
        let store = ScriptedStore::new();
        store.seed(STAGING, &["a.pdf"]).await;
        store.script(
            "a.pdf",
            vec![CopyStatus::Pending, CopyStatus::Pending, CopyStatus::Success],
        );
        let index = Arc::new(RecordingIndex::default());

        let report = promotion(&store, &index, 1)
            .promote(&names(&["a.pdf"]))
            .await
            .expect("promotion");

        assert!(report.documents[0].is_promoted());
        assert_eq!(store.polls("a.pdf"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_copy_times_out_without_blocking_the_batch() {
        let store = ScriptedStore::new();
        store.seed(STAGING, &["stuck.pdf", "fine.pdf"]).await;
        store.stick("stuck.pdf");
        let index = Arc::new(RecordingIndex::default());

        let report = promotion(&store, &index, 1)
            .promote(&names(&["stuck.pdf", "fine.pdf"]))
            .await
            .expect("promotion");

        assert!(matches!(
            report.documents[0].outcome,
            Err(PromotionFailure::CopyTimeout { waited }) if waited >= Duration::from_secs(5)
        ));
        assert!(report.documents[1].is_promoted());
        assert_eq!(index.refresh_count(), 1);
    }

    #[tokio::test]
    async fn failed_copy_and_missing_source_are_reported() {
        let store = ScriptedStore::new();
        store.seed(STAGING, &["bad.pdf"]).await;
        store.script(
            "bad.pdf",
            vec![CopyStatus::Failed("500 InternalError".into())],
        );
        let index = Arc::new(RecordingIndex::default());

        let report = promotion(&store, &index, 1)
            .promote(&names(&["bad.pdf", "ghost.pdf"]))
            .await
            .expect("promotion");

        assert_eq!(
            report.documents[0].outcome,
            Err(PromotionFailure::CopyFailed {
                reason: "500 InternalError".into()
            })
        );
        assert_eq!(
            report.documents[1].outcome,
            Err(PromotionFailure::SourceMissing)
        );
        assert_eq!(report.failed_count(), 2);
        assert_eq!(index.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_batches_keep_submission_order() {
        let store = ScriptedStore::new();
        let batch = ["d.pdf", "c.pdf", "b.pdf", "a.pdf"];
        store.seed(STAGING, &batch).await;
        // Earlier names stay pending longer, so copies settle in reverse order.
        for (pending, name) in (0..batch.len()).rev().zip(batch) {
            let mut statuses = vec![CopyStatus::Pending; pending];
            statuses.push(CopyStatus::Success);
            store.script(name, statuses);
        }
        let index = Arc::new(RecordingIndex::default());

        let started = Instant::now();
        let report = promotion(&store, &index, 4)
            .promote(&names(&batch))
            .await
            .expect("promotion");

        let order: Vec<_> = report
            .documents
            .iter()
            .map(|doc| doc.name.as_str())
            .collect();
        assert_eq!(order, batch);
        assert_eq!(report.promoted_count(), 4);
        assert_eq!(store.polls("d.pdf"), 4);
        assert_eq!(store.polls("a.pdf"), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(1_500));
        assert_eq!(index.refresh_count(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_before_any_call() {
        let store = ScriptedStore::new();
        let index = Arc::new(RecordingIndex::default());

        let error = promotion(&store, &index, 1)
            .promote(&[])
            .await
            .expect_err("empty batch");

        assert!(matches!(error, PipelineError::InvalidInput(_)));
        assert!(index.calls().is_empty());
    }

    #[tokio::test]
    async fn throttled_refresh_still_reports_copies() {
        let store = ScriptedStore::new();
        store.seed(STAGING, &["a.pdf"]).await;
        let index = Arc::new(RecordingIndex::throttled());

        let report = promotion(&store, &index, 1)
            .promote(&names(&["a.pdf"]))
            .await
            .expect("throttle is not fatal");

        assert_eq!(report.promoted_count(), 1);
        assert!(matches!(report.refresh, RefreshOutcome::Throttled { .. }));
    }
}
