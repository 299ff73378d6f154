//! Blob storage integration.
//!
//! The pipeline talks to storage only through [`BlobStore`]. Containers are flat namespaces of
//! uniquely named blobs; copies between containers run server-side and are observed by polling.

pub mod azure;
pub mod listing;
pub mod local;
pub mod types;

use crate::config::{Config, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

pub use azure::AzureBlobStore;
pub use local::LocalBlobStore;
pub use types::{CopyHandle, CopyStatus, StorageError, StoredObject};

/// Interface implemented by blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the container when it does not exist yet.
    async fn ensure_container(&self, container: &str) -> Result<(), StorageError>;

    /// Report whether a blob exists.
    async fn exists(&self, container: &str, name: &str) -> Result<bool, StorageError>;

    /// Store a blob, overwriting any previous content.
    async fn put(
        &self,
        container: &str,
        name: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Fetch a blob and its recorded content type.
    async fn get(&self, container: &str, name: &str) -> Result<StoredObject, StorageError>;

    /// Delete a blob if present. Deleting a missing blob is not an error.
    async fn delete(&self, container: &str, name: &str) -> Result<(), StorageError>;

    /// List blob names in a container. A missing container lists as empty.
    async fn list(&self, container: &str) -> Result<Vec<String>, StorageError>;

    /// Start a server-side copy of `name` from `source` into `destination`.
    async fn copy(
        &self,
        source: &str,
        name: &str,
        destination: &str,
    ) -> Result<CopyHandle, StorageError>;

    /// Observe the state of a copy started by [`BlobStore::copy`].
    async fn copy_status(&self, handle: &CopyHandle) -> Result<CopyStatus, StorageError>;
}

/// Build the blob store selected by configuration.
pub fn build_blob_store(config: &Config) -> Result<Arc<dyn BlobStore>, StorageError> {
    match config.storage_backend {
        StorageBackend::Azure => {
            let url = config.blob_storage_url.as_deref().ok_or_else(|| {
                StorageError::InvalidUrl("BLOB_STORAGE_URL is not configured".into())
            })?;
            Ok(Arc::new(AzureBlobStore::new(url, config.blob_sas_token.clone())?))
        }
        StorageBackend::Memory => Ok(Arc::new(LocalBlobStore::in_memory())),
        StorageBackend::Local => Ok(Arc::new(LocalBlobStore::filesystem(Path::new(
            &config.local_storage_path,
        ))?)),
    }
}
