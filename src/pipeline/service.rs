//! Facade over the document pipeline and the trait the outer surfaces call through.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::promotion::DocumentPromotion;
use super::query::QueryPipeline;
use super::refresh::IndexRefresher;
use super::reset::ContainerReset;
use super::staging::{DocumentStaging, normalize_document_name};
use super::types::{
    ContainerKind, InitError, PipelineError, PipelineSettings, PromotionReport, RefreshOutcome,
    ResetReport, Stage, UploadOutcome,
};
use crate::answer::{AnswerGenerator, build_answer_generator};
use crate::config::Config;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::search::{SearchIndex, build_search_index};
use crate::storage::{BlobStore, StoredObject, build_blob_store};

/// Facade wiring staging, promotion, querying, and reset over shared backends.
pub struct DocumentService {
    store: Arc<dyn BlobStore>,
    settings: PipelineSettings,
    staging: DocumentStaging,
    promotion: DocumentPromotion,
    query: QueryPipeline,
    reset: ContainerReset,
    metrics: PipelineMetrics,
}

/// Operations exposed to the HTTP and CLI surfaces.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Stage a document under its normalized name unless one already exists.
    async fn upload(
        &self,
        name: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<UploadOutcome, PipelineError>;

    /// Remove a staged document. Missing documents are not an error.
    async fn delete(&self, name: &str) -> Result<(), PipelineError>;

    /// Read a document from either container.
    async fn fetch(&self, kind: ContainerKind, name: &str) -> Result<StoredObject, PipelineError>;

    /// List document names in either container.
    async fn list(&self, kind: ContainerKind) -> Result<Vec<String>, PipelineError>;

    /// Copy staged documents into the query container and refresh the indexer once.
    async fn promote(&self, names: &[String]) -> Result<PromotionReport, PipelineError>;

    /// Answer a question from the indexed documents.
    async fn answer(&self, question: &str) -> Result<String, PipelineError>;

    /// Delete everything in the query container and refresh the indexer once.
    async fn reset_query_container(&self) -> Result<ResetReport, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Wire the pipeline over the given backends.
    pub fn new(
        store: Arc<dyn BlobStore>,
        index: Arc<dyn SearchIndex>,
        generator: Arc<dyn AnswerGenerator>,
        settings: PipelineSettings,
    ) -> Self {
        let refresher = Arc::new(IndexRefresher::new(
            index.clone(),
            &settings.indexer_name,
            settings.refresh_settle_delay,
        ));
        let staging = DocumentStaging::new(store.clone(), &settings.staging_container);
        let promotion = DocumentPromotion::new(
            store.clone(),
            &settings.staging_container,
            &settings.query_container,
            settings.copy_poll,
            settings.promotion_concurrency,
            refresher.clone(),
        );
        let query = QueryPipeline::new(index, generator, settings.query.clone());
        let reset = ContainerReset::new(store.clone(), &settings.query_container, refresher);

        Self {
            store,
            settings,
            staging,
            promotion,
            query,
            reset,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Build backends from configuration and wire the pipeline over them.
    pub fn from_config(config: &Config) -> Result<Self, InitError> {
        tracing::info!(backend = ?config.storage_backend, "Initializing blob storage");
        let store = build_blob_store(config)?;
        tracing::info!(endpoint = %config.search_endpoint, "Initializing search client");
        let index = build_search_index(config)?;
        tracing::info!(deployment = %config.openai_deployment, "Initializing answer generator");
        let generator = build_answer_generator(config)?;
        Ok(Self::new(
            store,
            index,
            generator,
            PipelineSettings::from_config(config),
        ))
    }

    fn record_refresh(&self, refresh: &RefreshOutcome) {
        self.metrics
            .record_refresh(matches!(refresh, RefreshOutcome::Throttled { .. }));
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn upload(
        &self,
        name: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<UploadOutcome, PipelineError> {
        let name = normalize_document_name(name).ok_or_else(|| {
            PipelineError::InvalidInput(format!("unusable document name '{name}'"))
        })?;
        let outcome = self.staging.upload(&name, content, content_type).await?;
        match outcome {
            UploadOutcome::Stored(_) => self.metrics.record_upload(),
            UploadOutcome::AlreadyExists(_) => self.metrics.record_rejected_upload(),
        }
        Ok(outcome)
    }

    async fn delete(&self, name: &str) -> Result<(), PipelineError> {
        self.staging.delete(name).await
    }

    async fn fetch(&self, kind: ContainerKind, name: &str) -> Result<StoredObject, PipelineError> {
        if name.trim().is_empty() {
            return Err(PipelineError::InvalidInput("document name is empty".into()));
        }
        self.store
            .get(self.settings.container(kind), name)
            .await
            .map_err(|source| PipelineError::storage(Stage::Fetch, name, source))
    }

    async fn list(&self, kind: ContainerKind) -> Result<Vec<String>, PipelineError> {
        let container = self.settings.container(kind);
        self.store
            .list(container)
            .await
            .map_err(|source| PipelineError::storage(Stage::List, container, source))
    }

    async fn promote(&self, names: &[String]) -> Result<PromotionReport, PipelineError> {
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(PipelineError::InvalidInput(
                "promotion batch contains a blank document name".into(),
            ));
        }
        let report = self.promotion.promote(names).await?;
        self.metrics
            .record_promotion(report.promoted_count() as u64, report.failed_count() as u64);
        self.record_refresh(&report.refresh);
        Ok(report)
    }

    async fn answer(&self, question: &str) -> Result<String, PipelineError> {
        let answer = self.query.answer(question).await?;
        self.metrics.record_answer();
        Ok(answer)
    }

    async fn reset_query_container(&self) -> Result<ResetReport, PipelineError> {
        let report = self.reset.reset().await?;
        self.metrics.record_reset(report.deleted as u64);
        self.record_refresh(&report.refresh);
        Ok(report)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
