mod common;

use std::sync::Arc;

use bytes::Bytes;
use common::{QUERY, STAGING, mock_backends, service};
use docqna::pipeline::{
    ContainerKind, DocumentApi, PipelineError, PromotionFailure, RefreshOutcome, Stage,
    UploadOutcome,
};
use docqna::search::SearchIndexError;
use docqna::storage::{AzureBlobStore, BlobStore, LocalBlobStore};
use httpmock::{
    Method::{GET, HEAD, PUT},
    MockServer,
};
use regex::Regex;

fn pdf(text: &'static str) -> Bytes {
    Bytes::from_static(text.as_bytes())
}

#[tokio::test]
async fn documents_flow_from_upload_to_answer() {
    let server = MockServer::start_async().await;
    let backends = mock_backends(&server, 202).await;
    let store = Arc::new(LocalBlobStore::in_memory());
    let service = service(&server, store.clone());

    let first = service
        .upload("a.pdf", pdf("%PDF alpha"), "application/pdf")
        .await
        .expect("upload a");
    service
        .upload("c.pdf", pdf("%PDF gamma"), "application/pdf")
        .await
        .expect("upload c");
    let duplicate = service
        .upload("a.pdf", pdf("%PDF replaced"), "application/pdf")
        .await
        .expect("duplicate upload");

    assert_eq!(first, UploadOutcome::Stored("a.pdf".into()));
    assert_eq!(duplicate, UploadOutcome::AlreadyExists("a.pdf".into()));

    let report = service
        .promote(&["a.pdf".to_string(), "c.pdf".to_string()])
        .await
        .expect("promote");
    assert_eq!(report.promoted_count(), 2);
    assert_eq!(report.refresh, RefreshOutcome::Requested);
    backends.get_indexer.assert_hits(1);
    backends.reset_indexer.assert_hits(1);
    backends.run_indexer.assert_hits(1);

    // Removing the staged original leaves the promoted copy in place.
    service.delete("a.pdf").await.expect("delete staged");
    let promoted = service
        .fetch(ContainerKind::Query, "a.pdf")
        .await
        .expect("promoted copy");
    assert_eq!(promoted.content, pdf("%PDF alpha"));
    assert_eq!(
        service.list(ContainerKind::Staging).await.expect("list"),
        vec!["c.pdf".to_string()]
    );

    let answer = service
        .answer("What do A and C say?")
        .await
        .expect("answer");
    assert_eq!(answer, "Alpha and Gamma.");
    backends.search.assert_hits(1);
    backends.chat.assert_hits(1);
}

#[tokio::test]
async fn throttled_refresh_does_not_fail_promotion() {
    let server = MockServer::start_async().await;
    let backends = mock_backends(&server, 429).await;
    let store = Arc::new(LocalBlobStore::in_memory());
    let service = service(&server, store.clone());
    service
        .upload("a.pdf", pdf("%PDF"), "application/pdf")
        .await
        .expect("upload");

    let report = service
        .promote(&["a.pdf".to_string(), "missing.pdf".to_string()])
        .await
        .expect("throttle is swallowed");

    let RefreshOutcome::Throttled { message } = &report.refresh else {
        panic!("expected a throttled refresh, got {:?}", report.refresh);
    };
    assert!(message.contains("Too many"));
    assert!(report.documents[0].is_promoted());
    assert_eq!(
        report.documents[1].outcome,
        Err(PromotionFailure::SourceMissing)
    );
    assert!(store.exists(QUERY, "a.pdf").await.expect("exists"));
    backends.run_indexer.assert_hits(1);
    assert_eq!(service.metrics_snapshot().refreshes_throttled, 1);
}

#[tokio::test]
async fn reset_clears_query_container_and_refreshes_once() {
    let server = MockServer::start_async().await;
    let backends = mock_backends(&server, 202).await;
    let store = Arc::new(LocalBlobStore::in_memory());
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        store
            .put(QUERY, name, pdf("%PDF"), "application/pdf")
            .await
            .expect("seed query");
    }
    store
        .put(STAGING, "a.pdf", pdf("%PDF"), "application/pdf")
        .await
        .expect("seed staging");
    let service = service(&server, store.clone());

    let report = service.reset_query_container().await.expect("reset");

    assert_eq!(report.deleted, 3);
    assert!(store.list(QUERY).await.expect("list").is_empty());
    assert_eq!(
        store.list(STAGING).await.expect("list"),
        vec!["a.pdf".to_string()]
    );
    backends.run_indexer.assert_hits(1);
}

#[tokio::test]
async fn missing_indexer_surfaces_refresh_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/indexers/doc-indexer");
            then.status(404);
        })
        .await;
    let store = Arc::new(LocalBlobStore::in_memory());
    let service = service(&server, store.clone());
    service
        .upload("a.pdf", pdf("%PDF"), "application/pdf")
        .await
        .expect("upload");

    let error = service
        .promote(&["a.pdf".to_string()])
        .await
        .expect_err("indexer missing");

    assert!(matches!(
        error,
        PipelineError::Search {
            stage: Stage::Refresh,
            source: SearchIndexError::IndexerNotFound(_)
        }
    ));
    assert!(store
        .exists(QUERY, "a.pdf")
        .await
        .expect("copy still landed"));
}

#[tokio::test]
async fn promotion_over_blob_rest_api_polls_each_copy() {
    let server = MockServer::start_async().await;
    let backends = mock_backends(&server, 202).await;
    let blob_path = Regex::new(r"^/query/[^/]+\.pdf$").expect("regex");
    let container = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/query")
                .query_param("restype", "container");
            then.status(201);
        })
        .await;
    let copies = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path_matches(blob_path.clone())
                .header_exists("x-ms-copy-source");
            then.status(202)
                .header("x-ms-copy-id", "copy-1")
                .header("x-ms-copy-status", "pending");
        })
        .await;
    let statuses = server
        .mock_async(|when, then| {
            when.method(HEAD).path_matches(blob_path.clone());
            then.status(200).header("x-ms-copy-status", "success");
        })
        .await;
    let store = Arc::new(AzureBlobStore::new(&server.base_url(), None).expect("blob store"));
    let service = service(&server, store);

    let report = service
        .promote(&["a.pdf".to_string(), "b.pdf".to_string()])
        .await
        .expect("promote");

    assert_eq!(report.promoted_count(), 2);
    container.assert_hits(1);
    copies.assert_hits(2);
    statuses.assert_hits(2);
    backends.run_indexer.assert_hits(1);
}
