//! Passage retrieval and grounded answering.

use std::fmt::Write as _;
use std::sync::Arc;

use futures_util::TryStreamExt;
use serde_json::Value;
use tracing::{debug, info};

use super::types::{PipelineError, Stage};
use crate::answer::{AnswerGenerator, SYSTEM_INSTRUCTION, build_prompt};
use crate::search::{QueryOptions, SearchDocument, SearchIndex};

/// One retrieved passage with the title of the document it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPassage {
    /// Title of the source document.
    pub title: String,
    /// Passage text.
    pub chunk: String,
}

impl SearchPassage {
    /// Extract a passage from a result document. Results missing either field yield `None`.
    pub fn from_document(document: &SearchDocument) -> Option<Self> {
        Some(Self {
            title: field_text(document, "title")?,
            chunk: field_text(document, "chunk")?,
        })
    }
}

fn field_text(document: &SearchDocument, field: &str) -> Option<String> {
    match document.get(field)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Ordered passages handed to the answer generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchContext {
    passages: Vec<SearchPassage>,
}

impl SearchContext {
    /// Append a passage, keeping relevance order.
    pub fn push(&mut self, passage: SearchPassage) {
        self.passages.push(passage);
    }

    /// Passages in relevance order.
    pub fn passages(&self) -> &[SearchPassage] {
        &self.passages
    }

    /// Whether retrieval found nothing usable.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Render the context block embedded in the prompt.
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for passage in &self.passages {
            let _ = write!(
                rendered,
                "Title of document: {}\nSearch result: {}\n\n",
                passage.title, passage.chunk
            );
        }
        rendered
    }
}

/// Retrieves passages for a question and asks the generator to answer from them.
pub struct QueryPipeline {
    index: Arc<dyn SearchIndex>,
    generator: Arc<dyn AnswerGenerator>,
    options: QueryOptions,
}

impl QueryPipeline {
    /// Pipeline over `index` and `generator` using `options` for every query.
    pub fn new(
        index: Arc<dyn SearchIndex>,
        generator: Arc<dyn AnswerGenerator>,
        options: QueryOptions,
    ) -> Self {
        Self {
            index,
            generator,
            options,
        }
    }

    /// Query the index and collect usable passages in relevance order.
    pub async fn retrieve(&self, question: &str) -> Result<SearchContext, PipelineError> {
        let mut results = self.index.search(question, &self.options);
        let mut context = SearchContext::default();
        let mut skipped = 0usize;

        while let Some(document) = results
            .try_next()
            .await
            .map_err(|source| PipelineError::search(Stage::Query, source))?
        {
            match SearchPassage::from_document(&document) {
                Some(passage) => context.push(passage),
                None => skipped += 1,
            }
        }

        debug!(
            passages = context.passages().len(),
            skipped, "Retrieved search context"
        );
        Ok(context)
    }

    /// Answer `question` from retrieved context.
    ///
    /// An empty context is still sent; the generator decides how to respond. The generator's
    /// text is returned without post-processing.
    pub async fn answer(&self, question: &str) -> Result<String, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidInput("question is empty".into()));
        }

        let context = self.retrieve(question).await?;
        let prompt = build_prompt(&context.render(), question);
        let answer = self.generator.complete(SYSTEM_INSTRUCTION, &prompt).await?;
        info!(
            passages = context.passages().len(),
            answer_chars = answer.len(),
            "Question answered"
        );
        Ok(answer)
    }
}
