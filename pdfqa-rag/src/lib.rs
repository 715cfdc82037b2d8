//! # pdfqa-rag
//!
//! Single-document retrieval-augmented question answering over PDFs.
//!
//! ## Overview
//!
//! - [`extract`] — PDF → cleaned full text
//! - [`RecursiveChunker`] — overlapping, length-bounded chunks
//! - [`EmbeddingProvider`] — text → fixed-size vectors ([`HashEmbeddingProvider`],
//!   `openai::OpenAIEmbeddingProvider`)
//! - [`VectorIndex`] — one atomically replaceable generation of chunks
//!   ([`InMemoryVectorIndex`])
//! - [`AnswerGenerator`] — grounding prompt → answer ([`ExtractiveGenerator`],
//!   `chat::ChatCompletionGenerator`)
//! - [`RagPipeline`] — ties them together for ingestion and question answering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pdfqa_rag::*;
//!
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .generator(Arc::new(ExtractiveGenerator))
//!     .build()?;
//!
//! pipeline.ingest_text("Alpha beta gamma. Delta epsilon zeta.").await?;
//! let answer = pipeline.answer("What comes after beta?", Some(1)).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generator;
pub mod hashing;
pub mod index;
pub mod inmemory;
pub mod metric;
pub mod pipeline;
pub mod prompt;

#[cfg(feature = "openai")]
pub mod chat;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{ChunkSpan, Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Answer, Chunk, IndexStatus, IngestReport, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generator::{AnswerGenerator, ExtractiveGenerator};
pub use hashing::HashEmbeddingProvider;
pub use index::VectorIndex;
pub use inmemory::InMemoryVectorIndex;
pub use metric::DistanceMetric;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::{DONT_KNOW_SENTINEL, NOT_FROM_DOCUMENT_SENTINEL};

#[cfg(feature = "openai")]
pub use chat::ChatCompletionGenerator;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
