//! HTTP client for Azure Blob Storage.
//!
//! Requests are authorized with an optional SAS token appended to every URL, so no request
//! signing happens here. Server-side copies use `x-ms-copy-source` and are observed through the
//! `x-ms-copy-status` header on the destination blob.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};

use super::BlobStore;
use super::listing::parse_blob_list;
use super::types::{CopyHandle, CopyStatus, StorageError, StoredObject};

const API_VERSION: &str = "2021-08-06";
const COPY_STATUS_HEADER: &str = "x-ms-copy-status";
const COPY_DESCRIPTION_HEADER: &str = "x-ms-copy-status-description";
const COPY_ID_HEADER: &str = "x-ms-copy-id";

/// Blob store backed by the Azure Blob Storage REST API.
pub struct AzureBlobStore {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) sas_token: Option<String>,
}

impl AzureBlobStore {
    /// Construct a client for the account endpoint, e.g. `https://acct.blob.core.windows.net`.
    pub fn new(base_url: &str, sas_token: Option<String>) -> Result<Self, StorageError> {
        let client = Client::builder().user_agent("docqna/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(StorageError::InvalidUrl)?;
        let sas_token = sas_token
            .map(|token| token.trim().trim_start_matches('?').to_string())
            .filter(|token| !token.is_empty());
        tracing::debug!(
            url = %base_url,
            has_sas_token = sas_token.is_some(),
            "Initialized blob storage HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            sas_token,
        })
    }

    fn url(&self, container: &str, name: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| StorageError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push(container);
            if let Some(name) = name {
                segments.push(name);
            }
        }
        if let Some(token) = &self.sas_token {
            url.set_query(Some(token.as_str()));
        }
        Ok(url)
    }

    fn container_url(&self, container: &str) -> Result<Url, StorageError> {
        let mut url = self.url(container, None)?;
        url.query_pairs_mut().append_pair("restype", "container");
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("x-ms-version", API_VERSION)
    }

    async fn unexpected(response: Response, context: &str) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = StorageError::UnexpectedStatus { status, body };
        tracing::error!(error = %error, "{context}");
        error
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn ensure_container(&self, container: &str) -> Result<(), StorageError> {
        let response = self
            .request(Method::PUT, self.container_url(container)?)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                tracing::debug!(container, "Container created");
                Ok(())
            }
            StatusCode::CONFLICT => Ok(()),
            _ => Err(Self::unexpected(response, "Failed to ensure container").await),
        }
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StorageError> {
        let response = self
            .request(Method::HEAD, self.url(container, Some(name))?)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::unexpected(response, "Blob existence check failed").await),
        }
    }

    async fn put(
        &self,
        container: &str,
        name: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = content.len();
        let response = self
            .request(Method::PUT, self.url(container, Some(name))?)
            .header("x-ms-blob-type", "BlockBlob")
            .header(header::CONTENT_TYPE, content_type)
            .body(content)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(container, name, size, "Blob uploaded");
            Ok(())
        } else {
            Err(Self::unexpected(response, "Blob upload failed").await)
        }
    }

    async fn get(&self, container: &str, name: &str) -> Result<StoredObject, StorageError> {
        let response = self
            .request(Method::GET, self.url(container, Some(name))?)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let content_type = response
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let content = response.bytes().await?;
                Ok(StoredObject {
                    name: name.to_string(),
                    content,
                    content_type,
                })
            }
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                container: container.to_string(),
                name: name.to_string(),
            }),
            _ => Err(Self::unexpected(response, "Blob download failed").await),
        }
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), StorageError> {
        let response = self
            .request(Method::DELETE, self.url(container, Some(name))?)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                tracing::debug!(container, name, "Blob deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(Self::unexpected(response, "Blob delete failed").await),
        }
    }

    async fn list(&self, container: &str) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.container_url(container)?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("comp", "list");
                if let Some(marker) = &marker {
                    pairs.append_pair("marker", marker);
                }
            }

            let response = self.request(Method::GET, url).send().await?;
            match response.status() {
                StatusCode::OK => {}
                StatusCode::NOT_FOUND => {
                    tracing::debug!(container, "Container missing; listing as empty");
                    return Ok(names);
                }
                _ => return Err(Self::unexpected(response, "Blob listing failed").await),
            }

            let body = response.bytes().await?;
            let page = parse_blob_list(&body)?;
            names.extend(page.names);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(names)
    }

    async fn copy(
        &self,
        source: &str,
        name: &str,
        destination: &str,
    ) -> Result<CopyHandle, StorageError> {
        let source_url = self.url(source, Some(name))?;
        let response = self
            .request(Method::PUT, self.url(destination, Some(name))?)
            .header("x-ms-copy-source", source_url.as_str())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let headers = response.headers();
                let copy_id = headers
                    .get(COPY_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let initial_status = headers
                    .get(COPY_STATUS_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("pending");
                tracing::debug!(
                    source,
                    destination,
                    name,
                    copy_id = ?copy_id,
                    status = initial_status,
                    "Copy started"
                );
                Ok(CopyHandle {
                    container: destination.to_string(),
                    name: name.to_string(),
                    copy_id,
                })
            }
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                container: source.to_string(),
                name: name.to_string(),
            }),
            _ => Err(Self::unexpected(response, "Blob copy failed to start").await),
        }
    }

    async fn copy_status(&self, handle: &CopyHandle) -> Result<CopyStatus, StorageError> {
        let response = self
            .request(
                Method::HEAD,
                self.url(&handle.container, Some(&handle.name))?,
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let headers = response.headers();
                let description = headers
                    .get(COPY_DESCRIPTION_HEADER)
                    .and_then(|value| value.to_str().ok());
                let Some(status) = headers
                    .get(COPY_STATUS_HEADER)
                    .and_then(|value| value.to_str().ok())
                else {
                    // Blob exists without copy metadata: the copy completed synchronously.
                    return Ok(CopyStatus::Success);
                };
                CopyStatus::from_header(status, description).ok_or_else(|| {
                    StorageError::InvalidResponse(format!("unknown copy status '{status}'"))
                })
            }
            StatusCode::NOT_FOUND => Ok(CopyStatus::Failed(
                "destination blob disappeared before the copy settled".into(),
            )),
            _ => Err(Self::unexpected(response, "Copy status check failed").await),
        }
    }
}

fn normalize_base_url(url: &str) -> Result<Url, String> {
    let mut parsed = Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    parsed.set_query(None);
    Ok(parsed)
}
