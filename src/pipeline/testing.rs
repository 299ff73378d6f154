//! In-process fakes shared by the pipeline unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use serde_json::{Value, json};

use crate::answer::{AnswerError, AnswerGenerator};
use crate::search::{QueryOptions, SearchDocument, SearchIndex, SearchIndexError};
use crate::storage::{
    BlobStore, CopyHandle, CopyStatus, LocalBlobStore, StorageError, StoredObject,
};

pub(crate) fn document(title: Option<&str>, chunk: Option<&str>) -> SearchDocument {
    let mut doc = SearchDocument::new();
    doc.insert("@search.score".into(), json!(1.0));
    if let Some(title) = title {
        doc.insert("title".into(), Value::from(title));
    }
    if let Some(chunk) = chunk {
        doc.insert("chunk".into(), Value::from(chunk));
    }
    doc
}

/// Search index that records every call and replays canned documents.
#[derive(Default)]
pub(crate) struct RecordingIndex {
    documents: Vec<SearchDocument>,
    throttle_runs: bool,
    missing_indexer: bool,
    fail_search: bool,
    calls: Mutex<Vec<String>>,
}

impl RecordingIndex {
    pub(crate) fn with_documents(documents: Vec<SearchDocument>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    pub(crate) fn throttled() -> Self {
        Self {
            throttle_runs: true,
            ..Self::default()
        }
    }

    pub(crate) fn missing_indexer() -> Self {
        Self {
            missing_indexer: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_search() -> Self {
        Self {
            fail_search: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn refresh_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with("run:"))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl SearchIndex for RecordingIndex {
    fn search<'a>(
        &'a self,
        text: &'a str,
        options: &'a QueryOptions,
    ) -> BoxStream<'a, Result<SearchDocument, SearchIndexError>> {
        self.record(format!("search:{text}:{}", options.max_results));
        if self.fail_search {
            return Box::pin(stream::iter(vec![Err(SearchIndexError::UnexpectedStatus {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "down".into(),
            })]));
        }
        let documents: Vec<_> = self
            .documents
            .iter()
            .take(options.max_results)
            .cloned()
            .map(Ok)
            .collect();
        Box::pin(stream::iter(documents))
    }

    async fn get_indexer(&self, name: &str) -> Result<(), SearchIndexError> {
        self.record(format!("get:{name}"));
        if self.missing_indexer {
            return Err(SearchIndexError::IndexerNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn reset_indexer(&self, name: &str) -> Result<(), SearchIndexError> {
        self.record(format!("reset:{name}"));
        Ok(())
    }

    async fn run_indexer(&self, name: &str) -> Result<(), SearchIndexError> {
        self.record(format!("run:{name}"));
        if self.throttle_runs {
            return Err(SearchIndexError::Throttled("Too many requests".into()));
        }
        Ok(())
    }
}

/// Generator returning a fixed reply and recording each prompt.
pub(crate) struct CannedGenerator {
    reply: Result<String, String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl CannedGenerator {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl AnswerGenerator for CannedGenerator {
    async fn complete(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<String, AnswerError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push((system_instruction.to_string(), prompt.to_string()));
        self.reply.clone().map_err(AnswerError::GenerationFailed)
    }
}

/// In-memory store whose copy status answers follow a per-name script.
///
/// Names without a script report `Success`. A name scripted as stuck stays `Pending` forever.
pub(crate) struct ScriptedStore {
    inner: LocalBlobStore,
    scripts: Mutex<HashMap<String, VecDeque<CopyStatus>>>,
    stuck: Mutex<Vec<String>>,
    polls: Mutex<HashMap<String, usize>>,
    failing_deletes: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalBlobStore::in_memory(),
            scripts: Mutex::new(HashMap::new()),
            stuck: Mutex::new(Vec::new()),
            polls: Mutex::new(HashMap::new()),
            failing_deletes: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn script(&self, name: &str, statuses: Vec<CopyStatus>) {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(name.to_string(), statuses.into());
    }

    pub(crate) fn stick(&self, name: &str) {
        self.stuck
            .lock()
            .expect("stuck lock")
            .push(name.to_string());
    }

    pub(crate) fn fail_delete(&self, name: &str) {
        self.failing_deletes
            .lock()
            .expect("deletes lock")
            .push(name.to_string());
    }

    pub(crate) fn polls(&self, name: &str) -> usize {
        self.polls
            .lock()
            .expect("polls lock")
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) async fn seed(&self, container: &str, names: &[&str]) {
        for name in names {
            self.inner
                .put(
                    container,
                    name,
                    Bytes::from_static(b"%PDF-1.7"),
                    "application/pdf",
                )
                .await
                .expect("seed blob");
        }
    }
}

#[async_trait]
impl BlobStore for ScriptedStore {
    async fn ensure_container(&self, container: &str) -> Result<(), StorageError> {
        self.inner.ensure_container(container).await
    }

    async fn exists(&self, container: &str, name: &str) -> Result<bool, StorageError> {
        self.inner.exists(container, name).await
    }

    async fn put(
        &self,
        container: &str,
        name: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.inner.put(container, name, content, content_type).await
    }

    async fn get(&self, container: &str, name: &str) -> Result<StoredObject, StorageError> {
        self.inner.get(container, name).await
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), StorageError> {
        if self
            .failing_deletes
            .lock()
            .expect("deletes lock")
            .iter()
            .any(|failing| failing == name)
        {
            return Err(StorageError::InvalidResponse(format!("delete of {name} refused")));
        }
        self.inner.delete(container, name).await
    }

    async fn list(&self, container: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(container).await
    }

    async fn copy(
        &self,
        source: &str,
        name: &str,
        destination: &str,
    ) -> Result<CopyHandle, StorageError> {
        self.inner.copy(source, name, destination).await
    }

    async fn copy_status(&self, handle: &CopyHandle) -> Result<CopyStatus, StorageError> {
        *self
            .polls
            .lock()
            .expect("polls lock")
            .entry(handle.name.clone())
            .or_default() += 1;
        if self
            .stuck
            .lock()
            .expect("stuck lock")
            .contains(&handle.name)
        {
            return Ok(CopyStatus::Pending);
        }
        let scripted = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get_mut(&handle.name)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or(CopyStatus::Success))
    }
}
