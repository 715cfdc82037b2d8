//! Vector index trait: the single live generation of (chunk, embedding) pairs.

use std::path::Path;

use async_trait::async_trait;

use crate::document::SearchResult;
use crate::error::Result;

/// Storage for the chunks of exactly one document, searchable by distance.
///
/// The index holds one *generation* at a time. [`replace_all`](VectorIndex::replace_all)
/// swaps the whole generation atomically: a concurrent [`query`](VectorIndex::query)
/// sees either the old generation or the new one, never a mix, and a failed
/// replacement leaves the old generation in place.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.replace_all(chunks, embeddings).await?;
/// let nearest = index.query(&question_embedding, 2).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Discard the current generation and store `chunks` with their
    /// `embeddings` under ids `chunk_0 .. chunk_{n-1}`.
    ///
    /// Fails with [`RagError::IndexWrite`](crate::RagError::IndexWrite) when the
    /// counts differ, the embeddings disagree on dimensionality, or the store
    /// faults.
    async fn replace_all(&self, chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<()>;

    /// Return at most `k` chunks ordered by ascending distance to `embedding`.
    ///
    /// Returns an empty `Vec` when the index holds no chunks. Fails with
    /// [`RagError::IndexQuery`](crate::RagError::IndexQuery) when the embedding
    /// dimensionality does not match the stored vectors.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Number of chunks in the current generation.
    async fn count(&self) -> Result<usize>;

    /// Replace the current generation with an empty one and return how many
    /// chunks the discarded generation held.
    ///
    /// The returned count and the swap happen under the same write, so a
    /// concurrent [`replace_all`](VectorIndex::replace_all) is either fully
    /// counted or survives the clear.
    async fn clear(&self) -> Result<usize>;

    /// Whether the backing store can currently be used.
    async fn is_reachable(&self) -> bool {
        true
    }

    /// Short backend name used in errors and status output.
    fn backend_name(&self) -> &str;

    /// Where the index keeps its data, if anywhere besides memory.
    fn location(&self) -> Option<&Path> {
        None
    }
}
