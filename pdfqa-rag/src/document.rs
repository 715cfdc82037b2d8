//! Data types for chunks, retrieval results, and answers.

use serde::{Deserialize, Serialize};

/// A stored segment of the current document together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Sequential identifier within the current index generation (`chunk_0`, `chunk_1`, …).
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Identifier for the chunk at `index` in ingestion order.
    pub fn id_for(index: usize) -> String {
        format!("chunk_{index}")
    }
}

/// A retrieved chunk text paired with its distance to the query.
///
/// Smaller distance means more similar. Distances are only comparable within
/// one index generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The identifier of the retrieved chunk.
    pub id: String,
    /// The retrieved chunk text.
    pub text: String,
    /// Distance between the query and the chunk embedding.
    pub distance: f32,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Number of chunks in the new index generation.
    pub chunks_created: usize,
    /// Length of the extracted text in characters.
    pub text_length: usize,
}

/// A grounded answer to a question.
///
/// `retrieved_chunks` and `similarity_scores` always have equal length and
/// share positional order (most similar first).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The question as asked.
    pub question: String,
    /// The generator's answer.
    pub answer: String,
    /// Retrieved chunk texts, most similar first.
    pub retrieved_chunks: Vec<String>,
    /// Distance of each retrieved chunk, parallel to `retrieved_chunks`.
    pub similarity_scores: Vec<f32>,
}

impl Answer {
    pub(crate) fn new(question: &str, answer: String, results: Vec<SearchResult>) -> Self {
        let (retrieved_chunks, similarity_scores) =
            results.into_iter().map(|r| (r.text, r.distance)).unzip();
        Self { question: question.to_string(), answer, retrieved_chunks, similarity_scores }
    }
}

/// Health view of the vector index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    /// Whether the index backend is reachable.
    pub connected: bool,
    /// Number of chunks in the current generation (0 when not connected).
    pub count: usize,
}
