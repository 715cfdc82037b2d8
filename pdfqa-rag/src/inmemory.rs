//! In-memory vector index with copy-on-write generations.
//!
//! [`InMemoryVectorIndex`] keeps the live generation behind an
//! `Arc` inside a `tokio::sync::RwLock`. Queries clone the `Arc` and score
//! without holding the lock; replacement builds the next generation off to
//! the side and swaps the pointer. Optionally, each generation is mirrored to
//! a JSON snapshot file that is written before the swap.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::metric::DistanceMetric;

const BACKEND: &str = "InMemory";

/// One complete, immutable set of chunks for a single document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Generation {
    dimensions: Option<usize>,
    chunks: Vec<Chunk>,
}

impl Generation {
    fn build(texts: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if texts.len() != embeddings.len() {
            return Err(write_error(format!(
                "chunk/embedding count mismatch: {} chunks, {} embeddings",
                texts.len(),
                embeddings.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len);
        if dimensions == Some(0) {
            return Err(write_error("embeddings must not be empty".to_string()));
        }
        if let Some(expected) = dimensions {
            if let Some((i, bad)) = embeddings.iter().enumerate().find(|(_, e)| e.len() != expected)
            {
                return Err(write_error(format!(
                    "embedding {i} has {} dimensions, expected {expected}",
                    bad.len()
                )));
            }
        }

        let chunks = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| Chunk { id: Chunk::id_for(i), text, embedding })
            .collect();

        Ok(Self { dimensions, chunks })
    }
}

fn write_error(message: String) -> RagError {
    RagError::IndexWrite { backend: BACKEND.to_string(), message }
}

fn query_error(message: String) -> RagError {
    RagError::IndexQuery { backend: BACKEND.to_string(), message }
}

/// Whether a snapshot could be written into `dir` right now.
///
/// Checks the permission bits first, then creates and removes a marker file
/// so ACLs and read-only mounts are caught too.
async fn dir_is_writable(dir: &Path) -> bool {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {}
        Ok(_) => return false,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "snapshot directory not accessible");
            return false;
        }
    }

    let marker = dir.join(format!(".pdfqa-write-check-{}", std::process::id()));
    match tokio::fs::OpenOptions::new().write(true).create(true).truncate(true).open(&marker).await {
        Ok(file) => {
            drop(file);
            let _ = tokio::fs::remove_file(&marker).await;
            true
        }
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "snapshot directory not writable");
            false
        }
    }
}

/// An in-memory vector index holding a single document generation.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.replace_all(vec!["text".into()], vec![vec![1.0, 0.0]]).await?;
/// assert_eq!(index.count().await?, 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    metric: DistanceMetric,
    generation: RwLock<Arc<Generation>>,
    /// Serializes writers so the snapshot on disk and the live generation agree.
    writer: Mutex<()>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryVectorIndex {
    /// Create an empty index using cosine distance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `metric` to rank chunks.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Open an index mirrored to the snapshot file at `path`.
    ///
    /// An existing snapshot is loaded as the initial generation; a missing
    /// file starts an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexQuery`] if the snapshot exists but cannot be
    /// read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let generation = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Generation>(&bytes).map_err(|e| {
                error!(path = %path.display(), error = %e, "corrupt index snapshot");
                query_error(format!("failed to parse snapshot '{}': {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Generation::default(),
            Err(e) => {
                return Err(query_error(format!(
                    "failed to read snapshot '{}': {e}",
                    path.display()
                )));
            }
        };

        info!(path = %path.display(), chunk_count = generation.chunks.len(), "opened vector index");
        Ok(Self {
            metric: DistanceMetric::default(),
            generation: RwLock::new(Arc::new(generation)),
            writer: Mutex::new(()),
            snapshot_path: Some(path),
        })
    }

    /// The metric this index ranks by.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn current(&self) -> Arc<Generation> {
        Arc::clone(&*self.generation.read().await)
    }

    /// Persist `next`, install it, and return the chunk count of the generation it replaced.
    async fn swap(&self, next: Generation) -> Result<usize> {
        let _writer = self.writer.lock().await;
        self.persist(&next).await?;
        let previous = std::mem::replace(&mut *self.generation.write().await, Arc::new(next));
        Ok(previous.chunks.len())
    }

    async fn persist(&self, generation: &Generation) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec(generation)
            .map_err(|e| write_error(format!("failed to serialize snapshot: {e}")))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            error!(path = %tmp.display(), error = %e, "failed to write index snapshot");
            write_error(format!("failed to write snapshot '{}': {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to move index snapshot into place");
            write_error(format!("failed to replace snapshot '{}': {e}", path.display()))
        })?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn replace_all(&self, chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        let next = Generation::build(chunks, embeddings)?;
        let chunk_count = next.chunks.len();

        let previous = self.swap(next).await?;
        info!(chunk_count, previous, "replaced index generation");
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let removed = self.swap(Generation::default()).await?;
        info!(removed, "cleared index generation");
        Ok(removed)
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let generation = self.current().await;
        let Some(dimensions) = generation.dimensions else {
            return Ok(Vec::new());
        };
        if embedding.len() != dimensions {
            return Err(query_error(format!(
                "query has {} dimensions, index holds {dimensions}",
                embedding.len()
            )));
        }

        let mut scored: Vec<SearchResult> = generation
            .chunks
            .iter()
            .map(|chunk| SearchResult {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                distance: self.metric.distance(&chunk.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        debug!(k, result_count = scored.len(), "index query");
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.current().await.chunks.len())
    }

    async fn is_reachable(&self) -> bool {
        let Some(path) = self.snapshot_path.as_deref() else {
            return true;
        };
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        dir_is_writable(dir).await
    }

    fn backend_name(&self) -> &str {
        BACKEND
    }

    fn location(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}
