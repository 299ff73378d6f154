//! Shared types used by the search client and the query pipeline.

use crate::config::SearchQueryType;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// One result document, keyed by field name.
pub type SearchDocument = Map<String, Value>;

/// Errors returned while interacting with the search service.
#[derive(Debug, Error)]
pub enum SearchIndexError {
    /// Endpoint failed to parse or normalize.
    #[error("Invalid search endpoint: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service rejected the request because of rate limiting.
    #[error("Search service throttled the request: {0}")]
    Throttled(String),
    /// Named indexer does not exist.
    #[error("Indexer '{0}' not found")]
    IndexerNotFound(String),
    /// Service responded with an unexpected status code.
    #[error("Unexpected search response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the search service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Options applied to a passage query.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Query syntax.
    pub query_type: SearchQueryType,
    /// Upper bound on documents yielded.
    pub max_results: usize,
    /// Fields returned for each document.
    pub selected_fields: Vec<String>,
    /// Semantic configuration used when `query_type` is semantic.
    pub semantic_configuration: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            query_type: SearchQueryType::Full,
            max_results: 50,
            selected_fields: vec!["title".to_string(), "chunk".to_string()],
            semantic_configuration: None,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub(crate) value: Vec<SearchDocument>,
    #[serde(rename = "@odata.count", default)]
    pub(crate) count: Option<u64>,
    #[serde(rename = "@search.nextPageParameters", default)]
    pub(crate) next_page_parameters: Option<Value>,
}
