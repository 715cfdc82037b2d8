//! Ingestion and retrieval-QA orchestrator.
//!
//! The [`RagPipeline`] owns the single-document workflow:
//!
//! - **ingest**: extract → chunk → embed → [`VectorIndex::replace_all`]
//! - **answer**: embed question → query → assemble context → generate
//!
//! Ingestion is all-or-nothing: every step that can fail runs before the
//! index is touched, and the replacement itself is atomic.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfqa_rag::{RagPipeline, RagConfig, InMemoryVectorIndex, HashEmbeddingProvider, ExtractiveGenerator};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .generator(Arc::new(ExtractiveGenerator))
//!     .build()?;
//!
//! pipeline.ingest_pdf(Path::new("manual.pdf")).await?;
//! let answer = pipeline.answer("How do I reset it?", None).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Answer, IndexStatus, IngestReport, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::extract_text;
use crate::generator::AnswerGenerator;
use crate::index::VectorIndex;
use crate::prompt::{assemble_context, build_prompt};

/// The single-document RAG orchestrator.
///
/// Construct one via [`RagPipeline::builder()`] and share it behind an `Arc`;
/// all methods take `&self`.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    chunker: Arc<dyn Chunker>,
    generator: Arc<dyn AnswerGenerator>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.vector_index
    }

    /// Return a reference to the answer generator.
    pub fn generator(&self) -> &Arc<dyn AnswerGenerator> {
        &self.generator
    }

    /// Ingest the PDF at `path`, replacing whatever document was indexed before.
    ///
    /// Text extraction runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] or [`RagError::EmptyDocument`] for
    /// unusable files, and otherwise whatever [`ingest_text`](Self::ingest_text)
    /// returns. The index is unchanged on every error path.
    pub async fn ingest_pdf(&self, path: &Path) -> Result<IngestReport> {
        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || extract_text(&owned))
            .await
            .map_err(|e| RagError::Extraction(format!("extraction task failed: {e}")))??;

        info!(path = %path.display(), text_len = text.chars().count(), "extracted document text");
        self.ingest_text(&text).await
    }

    /// Ingest already-extracted document text: chunk → embed → replace.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyDocument`] if `text` is blank
    /// - [`RagError::Chunking`] if the chunker fails
    /// - [`RagError::Embedding`] if the provider fails or returns the wrong
    ///   number or size of vectors
    /// - [`RagError::IndexWrite`] if the index rejects the new generation
    pub async fn ingest_text(&self, text: &str) -> Result<IngestReport> {
        if text.trim().is_empty() {
            warn!("refusing to ingest empty document");
            return Err(RagError::EmptyDocument);
        }

        // 1. Chunk (CPU-bound on large documents, so off the async workers)
        let chunker = Arc::clone(&self.chunker);
        let owned = text.to_string();
        let chunks = tokio::task::spawn_blocking(move || chunker.chunk(&owned))
            .await
            .map_err(|e| RagError::Chunking(format!("chunking task failed: {e}")))?
            .map_err(|e| {
                error!(error = %e, "chunking failed during ingestion");
                match e {
                    RagError::Chunking(_) => e,
                    other => RagError::Chunking(other.to_string()),
                }
            })?;
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        // 2. Embed
        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(chunk_count = chunks.len(), error = %e, "embedding failed during ingestion");
            e
        })?;
        self.check_embeddings(&embeddings, chunks.len())?;

        // 3. Replace the index generation
        let chunks_created = chunks.len();
        self.vector_index.replace_all(chunks, embeddings).await.map_err(|e| {
            error!(chunk_count = chunks_created, error = %e, "index replacement failed");
            e
        })?;

        let report = IngestReport { chunks_created, text_length: text.chars().count() };
        info!(chunks_created, text_length = report.text_length, "ingested document");
        Ok(report)
    }

    /// Retrieve the `k` chunks closest to `question`, most similar first.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoDocument`] if the index is empty
    /// - [`RagError::NoRelevantContext`] if the query yields nothing usable
    /// - embedding and index errors are propagated unchanged
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<SearchResult>> {
        if self.vector_index.count().await? == 0 {
            return Err(RagError::NoDocument);
        }

        let embedding = self.embed_question(question).await?;
        let results = self.vector_index.query(&embedding, k).await.map_err(|e| {
            error!(k, error = %e, "index query failed");
            e
        })?;

        if results.is_empty() || results.iter().any(|r| !r.distance.is_finite()) {
            warn!(k, result_count = results.len(), "no usable chunks for question");
            return Err(RagError::NoRelevantContext);
        }
        Ok(results)
    }

    /// Answer `question` from the `k` most similar chunks.
    ///
    /// `k` defaults to [`RagConfig::top_k`]. The returned
    /// [`Answer::retrieved_chunks`] and [`Answer::similarity_scores`] are
    /// parallel and ordered by ascending distance.
    ///
    /// # Errors
    ///
    /// Everything [`retrieve`](Self::retrieve) returns, plus
    /// [`RagError::Generation`] for any generator fault.
    pub async fn answer(&self, question: &str, k: Option<usize>) -> Result<Answer> {
        let k = k.unwrap_or(self.config.top_k);
        let results = self.retrieve(question, k).await?;

        let context = assemble_context(&results);
        let prompt = build_prompt(&context, question);

        let answer = self.generator.generate(&prompt).await.map_err(|e| {
            error!(generator = self.generator.name(), error = %e, "answer generation failed");
            match e {
                RagError::Generation { .. } => e,
                other => RagError::Generation {
                    generator: self.generator.name().to_string(),
                    message: other.to_string(),
                },
            }
        })?;

        info!(k, result_count = results.len(), "answered question");
        Ok(Answer::new(question, answer, results))
    }

    /// Number of chunks in the current index generation.
    pub async fn count(&self) -> Result<usize> {
        self.vector_index.count().await
    }

    /// Drop the current document from the index. Returns how many chunks were removed.
    pub async fn clear(&self) -> Result<usize> {
        let removed = self.vector_index.clear().await?;
        info!(removed, "cleared index");
        Ok(removed)
    }

    /// Health view of the index.
    pub async fn status(&self) -> IndexStatus {
        if !self.vector_index.is_reachable().await {
            return IndexStatus { connected: false, count: 0 };
        }
        match self.vector_index.count().await {
            Ok(count) => IndexStatus { connected: true, count },
            Err(e) => {
                error!(error = %e, "index status check failed");
                IndexStatus { connected: false, count: 0 }
            }
        }
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        let embeddings = self.embedding_provider.embed_batch(&[question]).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;
        self.check_embeddings(&embeddings, 1)?;
        embeddings.into_iter().next().ok_or_else(|| self.embedding_error("no embedding returned"))
    }

    fn check_embeddings(&self, embeddings: &[Vec<f32>], expected: usize) -> Result<()> {
        if embeddings.len() != expected {
            return Err(self.embedding_error(&format!(
                "provider returned {} embeddings for {expected} inputs",
                embeddings.len()
            )));
        }
        let dimensions = self.embedding_provider.dimensions();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(self.embedding_error(&format!(
                "provider returned a {}-dimensional vector, expected {dimensions}",
                bad.len()
            )));
        }
        Ok(())
    }

    fn embedding_error(&self, message: &str) -> RagError {
        RagError::Embedding {
            provider: self.embedding_provider.model_name().to_string(),
            message: message.to_string(),
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider`, `vector_index`, and `generator` are required. The
/// config defaults to [`RagConfig::default`] and the chunker to a
/// [`RecursiveChunker`] built from the config.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_index(Arc::new(index))
///     .generator(Arc::new(generator))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(RagPipeline { config, embedding_provider, vector_index, chunker, generator })
    }
}
