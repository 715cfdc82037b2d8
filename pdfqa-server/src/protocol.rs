//! Request and response bodies of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_QUESTION_CHARS: usize = 500;
pub const MAX_N_RESULTS: usize = 10;

fn default_n_results() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question: String,
    pub answer: String,
    pub retrieved_chunks: Vec<String>,
    pub similarity_scores: Vec<f32>,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub chunks_created: usize,
    pub text_length: usize,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub database_connected: bool,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub collection_name: String,
    pub total_chunks: usize,
    pub database_path: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    pub chunks_removed: usize,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error kind, e.g. `no_document`.
    pub error: String,
    /// Human-readable description.
    pub detail: String,
}
