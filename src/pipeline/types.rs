//! Core data types and error definitions for the document pipeline.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::answer::AnswerError;
use crate::config::Config;
use crate::search::{QueryOptions, SearchIndexError};
use crate::storage::StorageError;

/// The two namespaces a document can occupy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Freshly uploaded documents awaiting promotion.
    #[default]
    Staging,
    /// Documents crawled by the search indexer.
    Query,
}

/// Pipeline step during which a backend call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Creating a container on first use.
    EnsureContainer,
    /// Checking for or storing an uploaded document.
    Upload,
    /// Reading a stored document.
    Fetch,
    /// Deleting a document.
    Delete,
    /// Enumerating a container.
    List,
    /// Starting a server-side copy.
    Copy,
    /// Polling a copy for completion.
    CopyStatus,
    /// Retrieving passages for a question.
    Query,
    /// Resetting and re-running the indexer.
    Refresh,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::EnsureContainer => "ensure container",
            Self::Upload => "upload",
            Self::Fetch => "fetch",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Copy => "copy",
            Self::CopyStatus => "copy status",
            Self::Query => "query",
            Self::Refresh => "index refresh",
        };
        f.write_str(label)
    }
}

/// Errors emitted by the document pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller supplied input the pipeline cannot act on.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Blob storage call failed.
    #[error("Storage {stage} failed for '{target}': {source}")]
    Storage {
        /// Step that issued the failing call.
        stage: Stage,
        /// Document or container name the call targeted.
        target: String,
        /// Underlying storage error.
        #[source]
        source: StorageError,
    },
    /// Search service call failed.
    #[error("Search {stage} failed: {source}")]
    Search {
        /// Step that issued the failing call.
        stage: Stage,
        /// Underlying search error.
        #[source]
        source: SearchIndexError,
    },
    /// Answer generation failed.
    #[error("Answer generation failed: {0}")]
    Answer(#[from] AnswerError),
}

impl PipelineError {
    pub(crate) fn storage(stage: Stage, target: &str, source: StorageError) -> Self {
        Self::Storage {
            stage,
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn search(stage: Stage, source: SearchIndexError) -> Self {
        Self::Search { stage, source }
    }

    /// Whether the failure reports a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage { source, .. } if source.is_not_found())
    }
}

/// Errors raised while wiring backends from configuration.
#[derive(Debug, Error)]
pub enum InitError {
    /// Blob store could not be constructed.
    #[error("Failed to initialize blob storage: {0}")]
    Storage(#[from] StorageError),
    /// Search client could not be constructed.
    #[error("Failed to initialize search client: {0}")]
    Search(#[from] SearchIndexError),
    /// Answer generator could not be constructed.
    #[error("Failed to initialize answer generator: {0}")]
    Answer(#[from] AnswerError),
}

/// Result of an upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Document was stored under the returned name.
    Stored(String),
    /// A staged document already uses this name; nothing was written.
    AlreadyExists(String),
}

impl UploadOutcome {
    /// Document name the outcome refers to.
    pub fn name(&self) -> &str {
        match self {
            Self::Stored(name) | Self::AlreadyExists(name) => name,
        }
    }
}

/// Why a single document in a promotion batch did not reach the query container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromotionFailure {
    /// No staged document has this name.
    #[error("document is not staged")]
    SourceMissing,
    /// Storage reported the copy as failed or aborted.
    #[error("copy failed: {reason}")]
    CopyFailed {
        /// Backend description of the failure.
        reason: String,
    },
    /// Copy was still pending when the wait budget ran out.
    #[error("copy still pending after {waited:?}")]
    CopyTimeout {
        /// Time spent polling before giving up.
        waited: Duration,
    },
}

/// Terminal state of one document in a promotion batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotedDocument {
    /// Document name.
    pub name: String,
    /// `Ok` when the copy succeeded.
    pub outcome: Result<(), PromotionFailure>,
}

impl PromotedDocument {
    /// Whether the document now exists in the query container.
    pub fn is_promoted(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Outcome of an indexer refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Indexer was reset and a run was accepted.
    Requested,
    /// Search service throttled the request; the index may lag behind storage.
    Throttled {
        /// Message returned by the service.
        message: String,
    },
}

/// Per-document results of a promotion batch plus the batch's single refresh outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionReport {
    /// Documents in submission order.
    pub documents: Vec<PromotedDocument>,
    /// Refresh issued after every copy settled.
    pub refresh: RefreshOutcome,
}

impl PromotionReport {
    /// Number of documents copied successfully.
    pub fn promoted_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|doc| doc.is_promoted())
            .count()
    }

    /// Number of documents that ended in a failure outcome.
    pub fn failed_count(&self) -> usize {
        self.documents.len() - self.promoted_count()
    }
}

/// Result of emptying the query container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetReport {
    /// Number of documents deleted.
    pub deleted: usize,
    /// Refresh issued after every deletion settled.
    pub refresh: RefreshOutcome,
}

/// Bounded wait applied to each server-side copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyPollPolicy {
    /// Delay between status checks.
    pub interval: Duration,
    /// Total wait after which the copy is reported as timed out.
    pub timeout: Duration,
}

impl Default for CopyPollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Tunables and names shared by the pipeline components.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Staging container name.
    pub staging_container: String,
    /// Query container name.
    pub query_container: String,
    /// Indexer refreshed after the query container changes.
    pub indexer_name: String,
    /// Options for passage retrieval.
    pub query: QueryOptions,
    /// Copy completion wait.
    pub copy_poll: CopyPollPolicy,
    /// Head start given to the indexer after a successful refresh request.
    pub refresh_settle_delay: Duration,
    /// Copies allowed in flight within one promotion batch.
    pub promotion_concurrency: usize,
}

impl PipelineSettings {
    /// Settings with default tunables for the given containers.
    pub fn new(staging_container: impl Into<String>, query_container: impl Into<String>) -> Self {
        Self {
            staging_container: staging_container.into(),
            query_container: query_container.into(),
            indexer_name: "doc-questioning-indexer".to_string(),
            query: QueryOptions::default(),
            copy_poll: CopyPollPolicy::default(),
            refresh_settle_delay: Duration::from_millis(1_500),
            promotion_concurrency: 1,
        }
    }

    /// Derive settings from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            staging_container: config.staging_container.clone(),
            query_container: config.query_container.clone(),
            indexer_name: config.search_indexer_name.clone(),
            query: QueryOptions {
                query_type: config.search_query_type,
                max_results: config.search_top,
                semantic_configuration: Some(config.search_semantic_configuration.clone()),
                ..QueryOptions::default()
            },
            copy_poll: CopyPollPolicy {
                interval: Duration::from_millis(config.copy_poll_interval_ms),
                timeout: Duration::from_millis(config.copy_timeout_ms),
            },
            refresh_settle_delay: Duration::from_millis(config.refresh_settle_delay_ms),
            promotion_concurrency: config.promotion_concurrency.max(1),
        }
    }

    /// Container name for `kind`.
    pub fn container(&self, kind: ContainerKind) -> &str {
        match kind {
            ContainerKind::Staging => &self.staging_container,
            ContainerKind::Query => &self.query_container,
        }
    }
}
