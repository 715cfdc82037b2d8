//! Error types for the `pdfqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting a document or answering a question.
///
/// Every component fails fast and wraps the underlying cause into exactly one
/// of these kinds. Nothing in this crate retries.
#[derive(Debug, Error)]
pub enum RagError {
    /// The PDF reader failed (corrupt file, unsupported encoding, unreadable pages).
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Extraction succeeded but produced no text.
    #[error("Document is empty or contains no extractable text")]
    EmptyDocument,

    /// An error occurred while splitting text into chunks.
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index rejected or failed a write.
    #[error("Index write error ({backend}): {message}")]
    IndexWrite {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector index rejected or failed a query.
    #[error("Index query error ({backend}): {message}")]
    IndexQuery {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A question was asked before any document was ingested.
    #[error("No document has been ingested yet; upload a PDF first")]
    NoDocument,

    /// The index returned nothing usable for the question.
    #[error("No relevant chunks found for the question")]
    NoRelevantContext,

    /// The answer generator failed.
    #[error("Generation error ({generator}): {message}")]
    Generation {
        /// The generator that produced the error.
        generator: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Whether the error was caused by the caller's input or call order rather
    /// than by a fault in the index, a model, or the generator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RagError::Extraction(_)
                | RagError::EmptyDocument
                | RagError::NoDocument
                | RagError::NoRelevantContext
                | RagError::Config(_)
        )
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Extraction(_) => "extraction_error",
            RagError::EmptyDocument => "empty_document",
            RagError::Chunking(_) => "chunking_error",
            RagError::Embedding { .. } => "embedding_error",
            RagError::IndexWrite { .. } => "index_write_error",
            RagError::IndexQuery { .. } => "index_query_error",
            RagError::NoDocument => "no_document",
            RagError::NoRelevantContext => "no_relevant_context",
            RagError::Generation { .. } => "generation_error",
            RagError::Config(_) => "config_error",
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_kinds_are_client_errors() {
        assert!(RagError::EmptyDocument.is_client_error());
        assert!(RagError::NoDocument.is_client_error());
        assert!(RagError::NoRelevantContext.is_client_error());
        assert!(RagError::Extraction("bad xref".into()).is_client_error());
    }

    #[test]
    fn backend_faults_are_server_errors() {
        let write = RagError::IndexWrite { backend: "InMemory".into(), message: "x".into() };
        let generation = RagError::Generation { generator: "Groq".into(), message: "x".into() };
        assert!(!write.is_client_error());
        assert!(!generation.is_client_error());
        assert!(!RagError::Chunking("x".into()).is_client_error());
    }

    #[test]
    fn display_names_the_backend() {
        let err = RagError::IndexQuery { backend: "InMemory".into(), message: "dims".into() };
        assert_eq!(err.to_string(), "Index query error (InMemory): dims");
        assert_eq!(err.kind(), "index_query_error");
    }
}
