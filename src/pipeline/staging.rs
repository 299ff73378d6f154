//! Upload and removal of staged documents.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use super::types::{PipelineError, Stage, UploadOutcome};
use crate::storage::BlobStore;

/// Reduce a client-supplied file name to its final path component.
///
/// Returns `None` when nothing usable remains.
pub fn normalize_document_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Writes to and removes from the staging container.
pub struct DocumentStaging {
    store: Arc<dyn BlobStore>,
    container: String,
}

impl DocumentStaging {
    /// Staging bound to `container`.
    pub fn new(store: Arc<dyn BlobStore>, container: &str) -> Self {
        Self {
            store,
            container: container.to_string(),
        }
    }

    /// Store `content` under `name` unless a staged document already uses that name.
    ///
    /// An existing document is never overwritten. The existence check and the write are two
    /// separate calls, so concurrent uploads of one name can both store.
    pub async fn upload(
        &self,
        name: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<UploadOutcome, PipelineError> {
        if name.trim().is_empty() {
            return Err(PipelineError::InvalidInput("document name is empty".into()));
        }

        self.store
            .ensure_container(&self.container)
            .await
            .map_err(|source| {
                PipelineError::storage(Stage::EnsureContainer, &self.container, source)
            })?;

        let exists = self
            .store
            .exists(&self.container, name)
            .await
            .map_err(|source| PipelineError::storage(Stage::Upload, name, source))?;
        if exists {
            info!(
                document = name,
                "Staged document already exists; upload skipped"
            );
            return Ok(UploadOutcome::AlreadyExists(name.to_string()));
        }

        let size = content.len();
        self.store
            .put(&self.container, name, content, content_type)
            .await
            .map_err(|source| PipelineError::storage(Stage::Upload, name, source))?;
        info!(document = name, bytes = size, "Document staged");
        Ok(UploadOutcome::Stored(name.to_string()))
    }

    /// Remove `name` from staging. Removing a missing document succeeds.
    pub async fn delete(&self, name: &str) -> Result<(), PipelineError> {
        if name.trim().is_empty() {
            return Err(PipelineError::InvalidInput("document name is empty".into()));
        }
        self.store
            .delete(&self.container, name)
            .await
            .map_err(|source| PipelineError::storage(Stage::Delete, name, source))?;
        debug!(document = name, "Staged document removed");
        Ok(())
    }
}
