use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::Utc;
use pdfqa_rag::RagPipeline;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    protocol::{
        ClearResponse, DatabaseStats, HealthResponse, HealthStatus, MAX_N_RESULTS,
        MAX_QUESTION_CHARS, QuestionRequest, QuestionResponse, UploadResponse,
    },
    settings::{DEFAULT_MAX_UPLOAD_BYTES, Settings},
};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub collection_name: String,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            pipeline,
            collection_name: "pdf_chunks".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload-pdf", post(upload_pdf).layer(DefaultBodyLimit::max(body_limit)))
        .route("/ask", post(ask))
        .route("/database/stats", get(database_stats))
        .route("/database/clear", delete(clear_database))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let pipeline = settings.build_pipeline().await?;
    let state = AppState::new(Arc::new(pipeline))
        .with_collection_name(settings.collection_name.clone())
        .with_max_upload_bytes(settings.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| "invalid host/port for pdfqa server")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("pdfqa-server listening on http://{}", addr);
    axum::serve(listener, app_router(state)).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "PDF Question Answering API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "endpoints": {
            "upload": "POST /upload-pdf",
            "ask": "POST /ask",
            "stats": "GET /database/stats",
            "clear": "DELETE /database/clear",
        },
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.pipeline.status().await;
    Json(HealthResponse {
        status: if status.connected { HealthStatus::Healthy } else { HealthStatus::Unhealthy },
        timestamp: Utc::now(),
        database_connected: status.connected,
        total_chunks: status.count,
    })
}

async fn upload_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let started = Instant::now();
    let limit = state.max_upload_bytes;
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.to_ascii_lowercase().ends_with(".pdf") {
            return Err(ApiError::BadRequest("Only PDF files are allowed".to_string()));
        }

        let upload = TempUpload::new();
        let size = write_field(field, upload.path(), limit).await?;
        info!(filename = %filename, size, "received upload");

        let report = state.pipeline.ingest_pdf(upload.path()).await?;
        return Ok(Json(UploadResponse {
            message: "PDF processed successfully".to_string(),
            filename,
            chunks_created: report.chunks_created,
            text_length: report.text_length,
            timestamp: Utc::now(),
            processing_time_ms: elapsed_ms(started),
        }));
    }

    Err(ApiError::BadRequest("No file uploaded; expected multipart field 'file'".to_string()))
}

async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> ApiResult<Json<QuestionResponse>> {
    let started = Instant::now();
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Question cannot be empty".to_string()));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Question must be at most {MAX_QUESTION_CHARS} characters"
        )));
    }
    if !(1..=MAX_N_RESULTS).contains(&request.n_results) {
        return Err(ApiError::BadRequest(format!(
            "n_results must be between 1 and {MAX_N_RESULTS}"
        )));
    }
    if !state.pipeline.status().await.connected {
        return Err(ApiError::Unavailable);
    }

    let answer = state.pipeline.answer(question, Some(request.n_results)).await?;
    Ok(Json(QuestionResponse {
        question: answer.question,
        answer: answer.answer,
        retrieved_chunks: answer.retrieved_chunks,
        similarity_scores: answer.similarity_scores,
        timestamp: Utc::now(),
        processing_time_ms: elapsed_ms(started),
    }))
}

async fn database_stats(State(state): State<AppState>) -> ApiResult<Json<DatabaseStats>> {
    let pipeline = &state.pipeline;
    let total_chunks = pipeline.count().await?;
    let database_path = pipeline
        .vector_index()
        .location()
        .map_or_else(|| "in-memory".to_string(), |path| path.display().to_string());

    Ok(Json(DatabaseStats {
        collection_name: state.collection_name.clone(),
        total_chunks,
        database_path,
        embedding_model: pipeline.embedding_provider().model_name().to_string(),
    }))
}

async fn clear_database(State(state): State<AppState>) -> ApiResult<Json<ClearResponse>> {
    let removed = state.pipeline.clear().await?;
    let message = if removed == 0 {
        "Database was already empty".to_string()
    } else {
        format!("Successfully cleared {removed} chunks from database")
    };
    Ok(Json(ClearResponse { message, chunks_removed: removed }))
}

/// Stream an upload field to `path`, failing once it grows past `limit` bytes.
async fn write_field(mut field: Field<'_>, path: &Path, limit: usize) -> ApiResult<usize> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0usize;
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
        written += chunk.len();
        if written > limit {
            return Err(ApiError::PayloadTooLarge(limit));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(written)
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(limit)
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// A uniquely named temp file that is removed when dropped.
struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    fn new() -> Self {
        Self { path: std::env::temp_dir().join(format!("pdfqa-upload-{}.pdf", Uuid::new_v4())) }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove temp upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_upload_is_removed_on_drop() {
        let upload = TempUpload::new();
        let path = upload.path().to_path_buf();
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        assert!(path.exists());

        drop(upload);
        assert!(!path.exists());
    }

    #[test]
    fn temp_upload_without_file_drops_quietly() {
        let upload = TempUpload::new();
        assert!(!upload.path().exists());
        drop(upload);
    }
}
