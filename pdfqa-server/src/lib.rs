//! `pdfqa-server` exposes the `pdfqa-rag` pipeline over HTTP: upload one PDF,
//! then ask questions answered from its content.

pub mod error;
pub mod protocol;
pub mod server;
pub mod settings;

pub use error::{ApiError, ApiResult};
pub use server::{AppState, app_router, run_server};
pub use settings::{EmbeddingBackend, Settings};
