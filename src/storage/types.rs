//! Shared types used by the blob store backends.

use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned while interacting with blob storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Base URL or blob name failed to form a valid request URL.
    #[error("Invalid blob storage URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Storage responded with an unexpected status code.
    #[error("Unexpected storage response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the storage service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Target blob does not exist.
    #[error("Blob '{name}' not found in container '{container}'")]
    NotFound {
        /// Container that was searched.
        container: String,
        /// Blob name that was requested.
        name: String,
    },
    /// Storage returned a payload that could not be interpreted.
    #[error("Malformed storage response: {0}")]
    InvalidResponse(String),
    /// Embedded object store backend failed.
    #[error("Object store error: {0}")]
    Backend(#[from] object_store::Error),
}

impl StorageError {
    /// Whether the error reports a missing blob.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Backend(object_store::Error::NotFound { .. })
        )
    }
}

/// Handle for an in-flight server-side copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyHandle {
    /// Destination container of the copy.
    pub container: String,
    /// Blob name shared by source and destination.
    pub name: String,
    /// Backend-assigned copy identifier, when the backend reports one.
    pub copy_id: Option<String>,
}

/// Observed state of a server-side copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    /// Copy has not settled yet.
    Pending,
    /// Destination blob holds the full source content.
    Success,
    /// Copy was aborted or failed, with the backend's description.
    Failed(String),
}

impl CopyStatus {
    /// Parse the `x-ms-copy-status` vocabulary.
    pub fn from_header(status: &str, description: Option<&str>) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "aborted" | "failed" => Some(Self::Failed(
                description
                    .filter(|value| !value.is_empty())
                    .unwrap_or(status)
                    .to_string(),
            )),
            _ => None,
        }
    }
}

/// Blob content returned by a fetch.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Blob name within its container.
    pub name: String,
    /// Raw content bytes.
    pub content: Bytes,
    /// Content type recorded at upload time, when the backend preserves it.
    pub content_type: Option<String>,
}
