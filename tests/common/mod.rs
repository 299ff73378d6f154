#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use docqna::answer::AzureOpenAiGenerator;
use docqna::pipeline::{CopyPollPolicy, DocumentService, PipelineSettings};
use docqna::search::AzureSearchClient;
use docqna::storage::BlobStore;
use httpmock::{
    Method::{GET, POST},
    Mock, MockServer,
};
use serde_json::json;

pub const STAGING: &str = "staging";
pub const QUERY: &str = "query";

/// Mocks standing in for the search service and the chat deployment.
pub struct Backends<'a> {
    pub get_indexer: Mock<'a>,
    pub reset_indexer: Mock<'a>,
    pub run_indexer: Mock<'a>,
    pub search: Mock<'a>,
    pub chat: Mock<'a>,
}

pub async fn mock_backends(server: &MockServer, run_status: u16) -> Backends<'_> {
    let get_indexer = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/indexers/doc-indexer")
                .header("api-key", "search-key");
            then.status(200).json_body(json!({ "name": "doc-indexer" }));
        })
        .await;
    let reset_indexer = server
        .mock_async(|when, then| {
            when.method(POST).path("/indexers/doc-indexer/reset");
            then.status(204);
        })
        .await;
    let run_indexer = server
        .mock_async(|when, then| {
            when.method(POST).path("/indexers/doc-indexer/run");
            then.status(run_status)
                .body("Too many requests to run the indexer");
        })
        .await;
    let search = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/indexes/docs/docs/search")
                .json_body_partial(
                    r#"{ "queryType": "full", "top": 50, "select": "title,chunk" }"#,
                );
            then.status(200).json_body(json!({
                "value": [
                    { "@search.score": 3.1, "title": "A", "chunk": "Alpha text" },
                    { "@search.score": 2.4, "title": "B" },
                    { "@search.score": 1.2, "title": "C", "chunk": "Gamma text" }
                ]
            }));
        })
        .await;
    let chat = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/deployments/gpt/chat/completions")
                .body_contains("Title of document: A\\nSearch result: Alpha text")
                .body_contains("Title of document: C\\nSearch result: Gamma text");
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "Alpha and Gamma." } }
                ]
            }));
        })
        .await;

    Backends {
        get_indexer,
        reset_indexer,
        run_indexer,
        search,
        chat,
    }
}

pub fn service(server: &MockServer, store: Arc<dyn BlobStore>) -> DocumentService {
    let index = AzureSearchClient::new(&server.base_url(), "docs", Some("search-key".into()))
        .expect("search client");
    let generator = AzureOpenAiGenerator::new(&server.base_url(), "gpt", Some("openai-key".into()))
        .expect("generator");
    let mut settings = PipelineSettings::new(STAGING, QUERY);
    settings.indexer_name = "doc-indexer".into();
    settings.refresh_settle_delay = Duration::ZERO;
    settings.copy_poll = CopyPollPolicy {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(1),
    };
    DocumentService::new(store, Arc::new(index), Arc::new(generator), settings)
}
