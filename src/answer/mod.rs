//! Grounded answer generation via a hosted chat model.
//!
//! The pipeline hands the generator a fixed system instruction and a prompt that embeds the
//! retrieved context ahead of the question. The Azure OpenAI adapter issues chat-completion
//! requests directly over HTTP.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

const API_VERSION: &str = "2024-06-01";

/// System instruction sent with every question.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful AI assistant that answers questions based on the provided context.";

/// Errors surfaced while generating an answer.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Provider endpoint was misconfigured or unreachable.
    #[error("Answer provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by answer generation providers.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Complete `prompt` under `system_instruction`, returning the model's text.
    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String, AnswerError>;
}

/// Assemble the user prompt from retrieved context and the caller's question.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {question}")
}

/// Build the answer generator described by configuration.
pub fn build_answer_generator(config: &Config) -> Result<Arc<dyn AnswerGenerator>, AnswerError> {
    Ok(Arc::new(AzureOpenAiGenerator::new(
        &config.openai_endpoint,
        &config.openai_deployment,
        config.openai_api_key.clone(),
    )?))
}

/// Chat-completions client for an Azure OpenAI deployment.
pub struct AzureOpenAiGenerator {
    http: Client,
    endpoint: String,
    deployment: String,
    api_key: Option<String>,
}

impl AzureOpenAiGenerator {
    /// Construct a client for `deployment` hosted at `endpoint`.
    pub fn new(
        endpoint: &str,
        deployment: &str,
        api_key: Option<String>,
    ) -> Result<Self, AnswerError> {
        let http = Client::builder()
            .user_agent("docqna/answer")
            .build()
            .map_err(|error| {
                AnswerError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: deployment.to_string(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AnswerGenerator for AzureOpenAiGenerator {
    async fn complete(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<String, AnswerError> {
        let payload = json!({
            "messages": [
                { "role": "system", "content": system_instruction },
                { "role": "user", "content": prompt }
            ]
        });

        let mut request = self
            .http
            .post(self.url())
            .query(&[("api-version", API_VERSION)])
            .json(&payload);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.header("api-key", api_key);
        }

        let response = request.send().await.map_err(|error| {
            AnswerError::ProviderUnavailable(format!("failed to reach {}: {error}", self.endpoint))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AnswerError::ProviderUnavailable(format!(
                "deployment {} not found at {}",
                self.deployment, self.endpoint
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            AnswerError::InvalidResponse(format!("failed to decode chat response: {error}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AnswerError::InvalidResponse("response carried no message content".into())
            })
    }
}
