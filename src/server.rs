//! REST API for document upload and status.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service info and endpoint list |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/documents` | List tracked documents, newest first (`?limit=`) |
//! | `GET`  | `/documents/{id}` | Full document record |
//! | `GET`  | `/documents/{id}/status` | Stage summary for one document |
//! | `POST` | `/upload` | Multipart upload (`file` field, `.pdf` or `.txt`); runs the pipeline |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "No file provided" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `processing_failed` (500), `internal` (500).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::extract::{ContentKind, SUPPORTED_EXTENSIONS};
use crate::models::DocumentRecord;
use crate::pipeline::Pipeline;
use crate::tracker::DocumentTracker;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    fn tracker(&self) -> &DocumentTracker {
        self.pipeline.tracker()
    }
}

/// Build the pipeline from `config` and serve the API on `[server].bind`.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::open(config).await?;

    let app = router(AppState::new(Arc::new(pipeline)), config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("paperchunk API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// The API router. Exposed so tests and embedders can mount it on their own
/// listener.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{id}", get(handle_get_document))
        .route("/documents/{id}/status", get(handle_document_status))
        .route("/upload", post(handle_upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct IndexResponse {
    service: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

async fn handle_index() -> Json<IndexResponse> {
    Json(IndexResponse {
        service: "paperchunk",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "GET /health",
            "GET /documents",
            "GET /documents/{id}",
            "GET /documents/{id}/status",
            "POST /upload",
        ],
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ /documents ============

#[derive(Deserialize)]
struct ListParams {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct DocumentListResponse {
    count: usize,
    documents: Vec<DocumentRecord>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let limit = params.limit.unwrap_or(100);
    if limit < 1 {
        return Err(bad_request("limit must be >= 1"));
    }
    let documents = state.tracker().list(limit).await.map_err(internal)?;
    Ok(Json(DocumentListResponse {
        count: documents.len(),
        documents,
    }))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DocumentRecord>, AppError> {
    state
        .tracker()
        .get(id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found(format!("document not found: {}", id)))
}

#[derive(Serialize)]
struct StatusResponse {
    id: i64,
    filename: String,
    status: String,
    current_folder: Option<String>,
    chunk_count: Option<i64>,
    processed_at: Option<String>,
    error: Option<String>,
}

async fn handle_document_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StatusResponse>, AppError> {
    let doc = state
        .tracker()
        .get(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("document not found: {}", id)))?;
    Ok(Json(StatusResponse {
        id: doc.id,
        filename: doc.filename,
        status: doc.status.to_string(),
        current_folder: doc.current_folder,
        chunk_count: doc.chunk_count,
        processed_at: doc.processed_at,
        error: doc.error,
    }))
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    document: DocumentRecord,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut upload: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read file: {}", e)))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| bad_request("No file provided"))?;
    if filename.trim().is_empty() {
        return Err(bad_request("No file selected"));
    }
    if ContentKind::from_path(std::path::Path::new(&filename)).is_err() {
        let allowed: Vec<String> = SUPPORTED_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect();
        return Err(bad_request(format!(
            "Invalid file type. Allowed: {}",
            allowed.join(", ")
        )));
    }

    tracing::info!(file = %filename, size = data.len(), "upload received");

    let temp_dir = tempfile::tempdir().map_err(|e| internal(e.into()))?;
    let temp_path = temp_dir.path().join("upload.bin");
    tokio::fs::write(&temp_path, &data)
        .await
        .map_err(|e| internal(e.into()))?;

    let document = state
        .pipeline
        .process_file(&temp_path, Some(&filename))
        .await
        .map_err(|e| {
            tracing::error!(file = %filename, error = %format!("{:#}", e), "processing failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "processing_failed",
                message: format!("Processing failed: {:#}", e),
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Document uploaded and processed successfully",
            document,
        }),
    ))
}
