//! Emptying the query container.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{info, warn};

use super::refresh::IndexRefresher;
use super::types::{PipelineError, ResetReport, Stage};
use crate::storage::BlobStore;

/// Deletes every document in the query container, then refreshes the indexer once.
pub struct ContainerReset {
    store: Arc<dyn BlobStore>,
    container: String,
    refresher: Arc<IndexRefresher>,
}

impl ContainerReset {
    /// Reset bound to `container`.
    pub fn new(store: Arc<dyn BlobStore>, container: &str, refresher: Arc<IndexRefresher>) -> Self {
        Self {
            store,
            container: container.to_string(),
            refresher,
        }
    }

    /// Delete every listed document concurrently and wait for all deletions to settle.
    ///
    /// If any deletion fails, the first failure is returned and no refresh is issued. Documents
    /// written after the listing are not removed.
    pub async fn reset(&self) -> Result<ResetReport, PipelineError> {
        let names = self
            .store
            .list(&self.container)
            .await
            .map_err(|source| PipelineError::storage(Stage::List, &self.container, source))?;

        info!(container = %self.container, documents = names.len(), "Clearing container");

        let results = join_all(names.iter().map(|name| async move {
            self.store
                .delete(&self.container, name)
                .await
                .map_err(|source| PipelineError::storage(Stage::Delete, name, source))
        }))
        .await;

        let mut first_error = None;
        let mut deleted = 0usize;
        for result in results {
            match result {
                Ok(()) => deleted += 1,
                Err(error) => {
                    warn!(error = %error, "Deletion failed during reset");
                    first_error.get_or_insert(error);
                }
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }

        let refresh = self.refresher.trigger().await?;
        Ok(ResetReport { deleted, refresh })
    }
}
