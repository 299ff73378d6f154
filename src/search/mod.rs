//! Search service integration.

pub mod client;
pub mod types;

use crate::config::Config;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;

pub use client::AzureSearchClient;
pub use types::{QueryOptions, SearchDocument, SearchIndexError};

/// Interface implemented by full-text search backends.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Run a query and stream matching documents in relevance order.
    fn search<'a>(
        &'a self,
        text: &'a str,
        options: &'a QueryOptions,
    ) -> BoxStream<'a, Result<SearchDocument, SearchIndexError>>;

    /// Confirm that the named indexer exists.
    async fn get_indexer(&self, name: &str) -> Result<(), SearchIndexError>;

    /// Reset the indexer's change-tracking state so the next run re-scans everything.
    async fn reset_indexer(&self, name: &str) -> Result<(), SearchIndexError>;

    /// Start an indexer run. Returns once the service accepts the request.
    async fn run_indexer(&self, name: &str) -> Result<(), SearchIndexError>;
}

/// Build the search client described by configuration.
pub fn build_search_index(config: &Config) -> Result<Arc<dyn SearchIndex>, SearchIndexError> {
    Ok(Arc::new(AzureSearchClient::new(
        &config.search_endpoint,
        &config.search_index_name,
        config.search_api_key.clone(),
    )?))
}
