use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pdfqa_rag::RagError;
use tracing::error;

use crate::protocol::ErrorResponse;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("File too large: at most {0} bytes allowed")]
    PayloadTooLarge(usize),

    #[error("Vector index is not reachable")]
    Unavailable,

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Rag(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Rag(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Unavailable => "service_unavailable",
            ApiError::Rag(e) => e.kind(),
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }

        let body = ErrorResponse { error: self.error_code().to_string(), detail: self.to_string() };
        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(format!("IO error: {err}"))
    }
}
