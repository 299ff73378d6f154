//! HTTP surface for the document Q&A service.
//!
//! Routes under `/api/qna` map one-to-one onto [`DocumentApi`] operations:
//!
//! - `POST /api/qna/upload` – Stage a multipart `file`. Returns the stored name, or `409` when a
//!   staged document already uses it.
//! - `POST /api/qna/prepare` – Promote a JSON array of staged names into the query container and
//!   refresh the indexer. Returns a per-document report.
//! - `POST /api/qna/query` – Answer a question given as a JSON string or `{ "question": .. }`.
//! - `DELETE /api/qna/delete?blobName=` – Remove a staged document.
//! - `DELETE /api/qna/empty-container` – Clear the query container and refresh the indexer.
//! - `GET /api/qna/documents?container=` – List names in `staging` (default) or `query`.
//! - `GET /api/qna/document?blobName=&container=` – Download a stored document.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable command catalog.
//!
//! Inputs are validated here before they reach the pipeline.

use crate::metrics::MetricsSnapshot;
use crate::pipeline::{
    ContainerKind, DocumentApi, PipelineError, PromotionFailure, PromotionReport, RefreshOutcome,
    ResetReport, UploadOutcome,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// Build the HTTP router exposing the document Q&A surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: DocumentApi + 'static,
{
    let qna = Router::new()
        .route("/upload", post(upload_document::<S>))
        .route("/prepare", post(prepare_documents::<S>))
        .route("/query", post(query_documents::<S>))
        .route("/delete", delete(delete_document::<S>))
        .route("/empty-container", delete(empty_container::<S>))
        .route("/documents", get(list_documents::<S>))
        .route("/document", get(fetch_document::<S>));

    Router::new()
        .nest("/api/qna", qna)
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Response body for `POST /api/qna/upload`.
#[derive(Serialize)]
struct UploadResponse {
    name: String,
    status: &'static str,
}

/// Stage the multipart `file` field.
///
/// The first field carrying a file name is used when no field is named `file`.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Response, AppError>
where
    S: DocumentApi,
{
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {err}")))?
    {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let content = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("failed to read upload: {err}")))?;
        upload = Some((file_name, content_type, content));
        break;
    }

    let Some((file_name, content_type, content)) = upload else {
        return Err(AppError::bad_request("no file supplied"));
    };
    if file_name.trim().is_empty() {
        return Err(AppError::bad_request("uploaded file has no name"));
    }
    if content.is_empty() {
        return Err(AppError::bad_request("uploaded file is empty"));
    }

    let outcome = service.upload(&file_name, content, &content_type).await?;
    let response = match outcome {
        UploadOutcome::Stored(name) => (
            StatusCode::OK,
            Json(UploadResponse {
                name,
                status: "stored",
            }),
        ),
        UploadOutcome::AlreadyExists(name) => (
            StatusCode::CONFLICT,
            Json(UploadResponse {
                name,
                status: "already_exists",
            }),
        ),
    };
    Ok(response.into_response())
}

/// Per-document entry in a promotion response.
#[derive(Serialize)]
struct PromotedEntry {
    name: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Refresh outcome as reported to callers.
#[derive(Serialize)]
struct RefreshEntry {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl From<RefreshOutcome> for RefreshEntry {
    fn from(outcome: RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Requested => Self {
                status: "requested",
                message: None,
            },
            RefreshOutcome::Throttled { message } => Self {
                status: "throttled",
                message: Some(message),
            },
        }
    }
}

/// Response body for `POST /api/qna/prepare`.
#[derive(Serialize)]
struct PrepareResponse {
    promoted: usize,
    failed: usize,
    documents: Vec<PromotedEntry>,
    refresh: RefreshEntry,
}

impl From<PromotionReport> for PrepareResponse {
    fn from(report: PromotionReport) -> Self {
        let promoted = report.promoted_count();
        let failed = report.failed_count();
        let documents = report
            .documents
            .into_iter()
            .map(|doc| {
                let (status, detail) = match &doc.outcome {
                    Ok(()) => ("promoted", None),
                    Err(failure @ PromotionFailure::SourceMissing) => {
                        ("source_missing", Some(failure.to_string()))
                    }
                    Err(failure @ PromotionFailure::CopyFailed { .. }) => {
                        ("copy_failed", Some(failure.to_string()))
                    }
                    Err(failure @ PromotionFailure::CopyTimeout { .. }) => {
                        ("copy_timeout", Some(failure.to_string()))
                    }
                };
                PromotedEntry {
                    name: doc.name,
                    status,
                    detail,
                }
            })
            .collect();
        Self {
            promoted,
            failed,
            documents,
            refresh: report.refresh.into(),
        }
    }
}

/// Promote the named staged documents.
async fn prepare_documents<S>(
    State(service): State<Arc<S>>,
    Json(names): Json<Vec<String>>,
) -> Result<Json<PrepareResponse>, AppError>
where
    S: DocumentApi,
{
    if names.is_empty() {
        return Err(AppError::bad_request("no document names supplied"));
    }
    if names.iter().any(|name| name.trim().is_empty()) {
        return Err(AppError::bad_request("document names must not be blank"));
    }
    let report = service.promote(&names).await?;
    tracing::info!(
        promoted = report.promoted_count(),
        failed = report.failed_count(),
        "Prepare request completed"
    );
    Ok(Json(report.into()))
}

/// Request body for `POST /api/qna/query`.
#[derive(Deserialize)]
#[serde(untagged)]
enum QueryRequest {
    /// Bare JSON string.
    Text(String),
    /// Object wrapping the question.
    Object { question: String },
}

impl QueryRequest {
    fn into_question(self) -> String {
        match self {
            Self::Text(question) | Self::Object { question } => question,
        }
    }
}

/// Response body for `POST /api/qna/query`.
#[derive(Serialize)]
struct QueryResponse {
    answer: String,
}

/// Answer a question from the indexed documents.
async fn query_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: DocumentApi,
{
    let question = request.into_question();
    if question.trim().is_empty() {
        return Err(AppError::bad_request("question must not be blank"));
    }
    let answer = service.answer(&question).await?;
    Ok(Json(QueryResponse { answer }))
}

/// Query string carrying a document name.
#[derive(Deserialize)]
struct DocumentParams {
    #[serde(rename = "blobName", default)]
    blob_name: Option<String>,
    #[serde(default)]
    container: ContainerKind,
}

impl DocumentParams {
    fn name(&self) -> Result<&str, AppError> {
        self.blob_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::bad_request("blobName is required"))
    }
}

/// Remove a staged document.
async fn delete_document<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<DocumentParams>,
) -> Result<StatusCode, AppError>
where
    S: DocumentApi,
{
    service.delete(params.name()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Response body for `DELETE /api/qna/empty-container`.
#[derive(Serialize)]
struct ResetResponse {
    deleted: usize,
    refresh: RefreshEntry,
}

/// Clear the query container and refresh the indexer.
async fn empty_container<S>(State(service): State<Arc<S>>) -> Result<Json<ResetResponse>, AppError>
where
    S: DocumentApi,
{
    let ResetReport { deleted, refresh } = service.reset_query_container().await?;
    Ok(Json(ResetResponse {
        deleted,
        refresh: refresh.into(),
    }))
}

/// Query string selecting a container.
#[derive(Deserialize)]
struct ContainerParams {
    #[serde(default)]
    container: ContainerKind,
}

/// Response body for `GET /api/qna/documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<String>,
}

async fn list_documents<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<ContainerParams>,
) -> Result<Json<DocumentsResponse>, AppError>
where
    S: DocumentApi,
{
    let documents = service.list(params.container).await?;
    Ok(Json(DocumentsResponse { documents }))
}

async fn fetch_document<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<DocumentParams>,
) -> Result<Response, AppError>
where
    S: DocumentApi,
{
    let object = service.fetch(params.container, params.name()?).await?;
    let content_type = object
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], object.content).into_response())
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/api/qna/upload",
                description: "Stage a PDF from multipart field `file`; 409 if already staged.",
                request_example: None,
            },
            CommandDescriptor {
                name: "prepare",
                method: "POST",
                path: "/api/qna/prepare",
                description: "Copy staged documents to the query container, then refresh once.",
                request_example: Some(json!(["report.pdf", "handbook.pdf"])),
            },
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/api/qna/query",
                description: "Answer a question from the indexed documents as { \"answer\" }.",
                request_example: Some(json!({ "question": "What does the handbook say?" })),
            },
            CommandDescriptor {
                name: "delete",
                method: "DELETE",
                path: "/api/qna/delete?blobName={name}",
                description: "Remove a staged document. Removing a missing document succeeds.",
                request_example: None,
            },
            CommandDescriptor {
                name: "empty_container",
                method: "DELETE",
                path: "/api/qna/empty-container",
                description: "Delete every query-container document and refresh the indexer.",
                request_example: None,
            },
            CommandDescriptor {
                name: "list_documents",
                method: "GET",
                path: "/api/qna/documents?container={staging|query}",
                description: "List document names in the staging (default) or query container.",
                request_example: None,
            },
            CommandDescriptor {
                name: "fetch_document",
                method: "GET",
                path: "/api/qna/document?blobName={name}&container={staging|query}",
                description: "Download a stored document with its recorded content type.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

struct AppError(PipelineError);

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(PipelineError::InvalidInput(message.into()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            error if error.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = %status, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
