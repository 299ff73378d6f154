//! Blob store backed by the `object_store` crate, for development and tests.
//!
//! Containers map to the first path segment. Copies complete synchronously, so every
//! [`CopyHandle`] issued here reports [`CopyStatus::Success`] on its first poll.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use uuid::Uuid;

use super::BlobStore;
use super::types::{CopyHandle, CopyStatus, StorageError, StoredObject};

/// Blob store over an in-memory or filesystem `object_store` backend.
#[derive(Clone)]
pub struct LocalBlobStore {
    store: Arc<dyn ObjectStore>,
    keep_attributes: bool,
}

impl LocalBlobStore {
    /// Create a process-local store whose contents vanish on drop.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            keep_attributes: true,
        }
    }

    /// Create a store rooted at `root`, creating the directory when needed.
    pub fn filesystem(root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root).map_err(|err| {
            StorageError::InvalidUrl(format!("cannot create {}: {err}", root.display()))
        })?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        tracing::debug!(root = %root.display(), "Initialized filesystem blob store");
        Ok(Self {
            store: Arc::new(store),
            // The filesystem backend rejects object attributes.
            keep_attributes: false,
        })
    }

    fn location(container: &str, name: &str) -> ObjPath {
        ObjPath::from_iter([container, name])
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn ensure_container(&self, _container: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StorageError> {
        match self.store.head(&Self::location(container, name)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(
        &self,
        container: &str,
        name: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut attributes = Attributes::new();
        if self.keep_attributes {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };
        self.store
            .put_opts(
                &Self::location(container, name),
                PutPayload::from_bytes(content),
                options,
            )
            .await?;
        tracing::debug!(container, name, "Blob stored");
        Ok(())
    }

    async fn get(&self, container: &str, name: &str) -> Result<StoredObject, StorageError> {
        let result = match self.store.get(&Self::location(container, name)).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound {
                    container: container.to_string(),
                    name: name.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        let content_type = result.attributes.get(&Attribute::ContentType).map(|value| {
            let value: &str = value.as_ref();
            value.to_string()
        });
        let content = result.bytes().await?;
        Ok(StoredObject {
            name: name.to_string(),
            content,
            content_type,
        })
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), StorageError> {
        match self.store.delete(&Self::location(container, name)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, container: &str) -> Result<Vec<String>, StorageError> {
        let prefix = ObjPath::from_iter([container]);
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;
        let mut names: Vec<String> = objects
            .iter()
            .filter_map(|meta| meta.location.filename().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn copy(
        &self,
        source: &str,
        name: &str,
        destination: &str,
    ) -> Result<CopyHandle, StorageError> {
        match self
            .store
            .copy(
                &Self::location(source, name),
                &Self::location(destination, name),
            )
            .await
        {
            Ok(()) => Ok(CopyHandle {
                container: destination.to_string(),
                name: name.to_string(),
                copy_id: Some(Uuid::new_v4().to_string()),
            }),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::NotFound {
                container: source.to_string(),
                name: name.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn copy_status(&self, handle: &CopyHandle) -> Result<CopyStatus, StorageError> {
        if self.exists(&handle.container, &handle.name).await? {
            Ok(CopyStatus::Success)
        } else {
            Ok(CopyStatus::Failed("destination blob missing after copy".into()))
        }
    }
}
