//! HTTP client for Azure AI Search.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_core::Stream;
use futures_util::stream::BoxStream;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};

use super::SearchIndex;
use super::types::{QueryOptions, SearchDocument, SearchIndexError, SearchResponse};
use crate::config::SearchQueryType;

const API_VERSION: &str = "2023-11-01";

/// Lightweight HTTP client for search queries and indexer control.
pub struct AzureSearchClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) index_name: String,
    pub(crate) api_key: Option<String>,
}

impl AzureSearchClient {
    /// Construct a client for `endpoint`, querying `index_name`.
    pub fn new(
        endpoint: &str,
        index_name: &str,
        api_key: Option<String>,
    ) -> Result<Self, SearchIndexError> {
        let client = Client::builder().user_agent("docqna/0.1").build()?;
        let base_url = normalize_base_url(endpoint).map_err(SearchIndexError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            index = index_name,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized search HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            index_name: index_name.to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self
            .client
            .request(method, url)
            .query(&[("api-version", API_VERSION)]);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn indexer_call(
        &self,
        method: Method,
        name: &str,
        action: Option<&str>,
    ) -> Result<(), SearchIndexError> {
        let path = match action {
            Some(action) => format!("indexers/{name}/{action}"),
            None => format!("indexers/{name}"),
        };
        let response = self.request(method, &path).send().await?;

        match response.status() {
            status if status.is_success() => {
                tracing::debug!(
                    indexer = name,
                    action = action.unwrap_or("get"),
                    "Indexer call accepted"
                );
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(SearchIndexError::IndexerNotFound(name.to_string())),
            _ => Err(failure(response).await),
        }
    }
}

#[async_trait]
impl SearchIndex for AzureSearchClient {
    fn search<'a>(
        &'a self,
        text: &'a str,
        options: &'a QueryOptions,
    ) -> BoxStream<'a, Result<SearchDocument, SearchIndexError>> {
        Box::pin(stream_documents(self, text, options))
    }

    async fn get_indexer(&self, name: &str) -> Result<(), SearchIndexError> {
        self.indexer_call(Method::GET, name, None).await
    }

    async fn reset_indexer(&self, name: &str) -> Result<(), SearchIndexError> {
        self.indexer_call(Method::POST, name, Some("reset")).await
    }

    async fn run_indexer(&self, name: &str) -> Result<(), SearchIndexError> {
        self.indexer_call(Method::POST, name, Some("run")).await
    }
}

/// Stream result documents for a query, following continuation pages until `max_results`.
pub(crate) fn stream_documents<'a>(
    client: &'a AzureSearchClient,
    text: &'a str,
    options: &'a QueryOptions,
) -> impl Stream<Item = Result<SearchDocument, SearchIndexError>> + Send + 'a {
    try_stream! {
        let path = format!("indexes/{}/docs/search", client.index_name);
        let mut body = build_query_body(text, options);
        let mut yielded = 0usize;

        'pages: loop {
            let response = client
                .request(Method::POST, &path)
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                let page: SearchResponse = response.json().await?;
                tracing::debug!(
                    index = %client.index_name,
                    results = page.value.len(),
                    total = ?page.count,
                    "Search page received"
                );
                for document in page.value {
                    if yielded >= options.max_results {
                        break 'pages;
                    }
                    yielded += 1;
                    yield document;
                }

                match page.next_page_parameters {
                    Some(next) if yielded < options.max_results => body = next,
                    _ => break,
                }
            } else {
                let error = failure(response).await;
                tracing::error!(index = %client.index_name, error = %error, "Search query failed");
                Err(error)?;
            }
        }
    }
}

/// Build the JSON body for a docs/search request.
pub(crate) fn build_query_body(text: &str, options: &QueryOptions) -> Value {
    let mut body = Map::new();
    body.insert("search".into(), Value::from(text));
    body.insert("top".into(), Value::from(options.max_results));
    body.insert("count".into(), Value::Bool(true));
    if !options.selected_fields.is_empty() {
        body.insert(
            "select".into(),
            Value::from(options.selected_fields.join(",")),
        );
    }

    match options.query_type {
        SearchQueryType::Full => {
            body.insert("queryType".into(), Value::from("full"));
        }
        SearchQueryType::Semantic => {
            body.insert("queryType".into(), Value::from("semantic"));
            body.insert(
                "semanticConfiguration".into(),
                Value::from(
                    options
                        .semantic_configuration
                        .as_deref()
                        .unwrap_or("default"),
                ),
            );
            body.insert("captions".into(), Value::from("extractive"));
            body.insert("answers".into(), Value::from("extractive"));
        }
    }

    Value::Object(body)
}

async fn failure(response: Response) -> SearchIndexError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
        SearchIndexError::Throttled(body)
    } else {
        SearchIndexError::UnexpectedStatus { status, body }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
