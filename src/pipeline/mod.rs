//! Document lifecycle and question answering.
//!
//! Documents are uploaded into a staging container, promoted into the query container that the
//! search indexer crawls, and finally answered against. Every change to the query container ends
//! with exactly one indexer refresh.

pub mod promotion;
pub mod query;
pub mod refresh;
pub mod reset;
pub mod service;
pub mod staging;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use promotion::DocumentPromotion;
pub use query::{QueryPipeline, SearchContext, SearchPassage};
pub use refresh::IndexRefresher;
pub use reset::ContainerReset;
pub use service::{DocumentApi, DocumentService};
pub use staging::{DocumentStaging, normalize_document_name};
pub use types::{
    ContainerKind, CopyPollPolicy, InitError, PipelineError, PipelineSettings, PromotedDocument,
    PromotionFailure, PromotionReport, RefreshOutcome, ResetReport, Stage, UploadOutcome,
};
