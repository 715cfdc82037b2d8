//! Service settings read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, bail};
use pdfqa_rag::{
    AnswerGenerator, ChatCompletionGenerator, DistanceMetric, EmbeddingProvider,
    ExtractiveGenerator, HashEmbeddingProvider, InMemoryVectorIndex, OpenAIEmbeddingProvider,
    RagConfig, RagPipeline,
};
use tracing::{info, warn};

/// Default upload limit: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Which embedding provider backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingBackend {
    /// Offline feature hashing; needs no model or key.
    #[default]
    Hash,
    /// An OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hash" | "hashing" => Ok(Self::Hash),
            "openai" => Ok(Self::OpenAi),
            other => bail!("unknown embedding provider '{other}' (expected 'hash' or 'openai')"),
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Groq key; without one answers come from [`ExtractiveGenerator`].
    pub groq_api_key: Option<String>,
    pub llm_model: String,
    pub llm_base_url: String,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: Option<String>,
    pub embedding_base_url: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_dimensions: Option<usize>,
    /// Snapshot file for the index; `None` keeps it in memory only.
    pub index_path: Option<PathBuf>,
    pub collection_name: String,
    pub max_upload_bytes: usize,
    pub rag: RagConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            groq_api_key: None,
            llm_model: pdfqa_rag::chat::DEFAULT_GROQ_MODEL.to_string(),
            llm_base_url: pdfqa_rag::chat::GROQ_API_BASE.to_string(),
            embedding_backend: EmbeddingBackend::Hash,
            embedding_model: None,
            embedding_base_url: None,
            embedding_api_key: None,
            embedding_dimensions: None,
            index_path: None,
            collection_name: "pdf_chunks".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            rag: RagConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, treating blank values as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = parse_var(&var, "PDFQA_PORT")?.unwrap_or(defaults.port);
        let max_upload_bytes =
            parse_var(&var, "MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload_bytes);
        let embedding_backend =
            parse_var(&var, "EMBEDDING_PROVIDER")?.unwrap_or(defaults.embedding_backend);
        let embedding_dimensions = parse_var(&var, "EMBEDDING_DIMENSIONS")?;

        let mut rag = RagConfig::builder();
        if let Some(size) = parse_var(&var, "CHUNK_SIZE")? {
            rag = rag.chunk_size(size);
        }
        if let Some(overlap) = parse_var(&var, "CHUNK_OVERLAP")? {
            rag = rag.chunk_overlap(overlap);
        }
        if let Some(metric) = parse_var::<DistanceMetric>(&var, "DISTANCE_METRIC")? {
            rag = rag.distance_metric(metric);
        }
        let rag = rag.build().context("invalid chunking configuration")?;

        Ok(Self {
            host: var("PDFQA_HOST").unwrap_or(defaults.host),
            port,
            groq_api_key: var("GROQ_API_KEY"),
            llm_model: var("LLM_MODEL_NAME").unwrap_or(defaults.llm_model),
            llm_base_url: var("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            embedding_backend,
            embedding_model: var("EMBEDDING_MODEL_NAME"),
            embedding_base_url: var("EMBEDDING_BASE_URL"),
            embedding_api_key: var("EMBEDDING_API_KEY").or_else(|| var("OPENAI_API_KEY")),
            embedding_dimensions,
            index_path: var("INDEX_PATH").map(PathBuf::from),
            collection_name: var("COLLECTION_NAME").unwrap_or(defaults.collection_name),
            max_upload_bytes,
            rag,
        })
    }

    /// Assemble the pipeline these settings describe.
    pub async fn build_pipeline(&self) -> anyhow::Result<RagPipeline> {
        let embedding_provider = self.embedding_provider()?;
        let generator = self.generator()?;

        let index = match &self.index_path {
            Some(path) => InMemoryVectorIndex::open(path)
                .await
                .with_context(|| format!("failed to open index snapshot '{}'", path.display()))?,
            None => InMemoryVectorIndex::new(),
        }
        .with_metric(self.rag.distance_metric);

        info!(
            embedding_model = embedding_provider.model_name(),
            dimensions = embedding_provider.dimensions(),
            generator = generator.name(),
            metric = ?self.rag.distance_metric,
            "pipeline configured"
        );

        RagPipeline::builder()
            .config(self.rag.clone())
            .embedding_provider(embedding_provider)
            .vector_index(Arc::new(index))
            .generator(generator)
            .build()
            .context("failed to build pipeline")
    }

    fn embedding_provider(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        match self.embedding_backend {
            EmbeddingBackend::Hash => {
                let provider = match self.embedding_dimensions {
                    Some(dims) => HashEmbeddingProvider::new(dims)?,
                    None => HashEmbeddingProvider::default(),
                };
                Ok(Arc::new(provider))
            }
            EmbeddingBackend::OpenAi => {
                let key = self
                    .embedding_api_key
                    .clone()
                    .context("EMBEDDING_API_KEY or OPENAI_API_KEY is required for openai embeddings")?;
                let mut provider = OpenAIEmbeddingProvider::new(key)?;
                if let Some(base_url) = &self.embedding_base_url {
                    provider = provider.with_base_url(base_url);
                }
                if let Some(model) = &self.embedding_model {
                    provider = provider.with_model(model);
                }
                if let Some(dims) = self.embedding_dimensions {
                    provider = provider.with_dimensions(dims);
                }
                Ok(Arc::new(provider))
            }
        }
    }

    fn generator(&self) -> anyhow::Result<Arc<dyn AnswerGenerator>> {
        match &self.groq_api_key {
            Some(key) => Ok(Arc::new(ChatCompletionGenerator::new(
                key.as_str(),
                self.llm_base_url.as_str(),
                self.llm_model.as_str(),
            )?)),
            None => {
                warn!("GROQ_API_KEY not set; answering with the closest passage instead of a model");
                Ok(Arc::new(ExtractiveGenerator))
            }
        }
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| raw.parse::<T>().map_err(|e| anyhow::anyhow!("invalid {name} '{raw}': {e}")))
        .transpose()
}
