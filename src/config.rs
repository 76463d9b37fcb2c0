//! Pipeline configuration: a plain [`RagConfig`] plus the clap surface that fills it.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use url::Url;

use crate::chat::ChatSettings;
use crate::chunker::ChunkerConfig;
use crate::error::{RagError, Result};
use crate::loader::web::DEFAULT_SELECTOR;
use crate::loader::SourceSpec;
use crate::normalizer::NormalizeOptions;
use crate::retriever::RetrievalDepth;
use crate::retry::RetryPolicy;

/// Default OpenAI-compatible base URL (Mistral).
pub const DEFAULT_MISTRAL_BASE: &str = "https://api.mistral.ai/v1";
/// Default Anthropic base URL.
pub const DEFAULT_ANTHROPIC_BASE: &str = "https://api.anthropic.com";
/// Default cross-encoder base URL.
pub const DEFAULT_RERANK_BASE: &str = "https://api.cohere.com/v2";

/// Completion backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChatProvider {
    /// OpenAI-compatible `/chat/completions` (Mistral, OpenAI, vLLM...).
    #[value(name = "openai")]
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
}

/// Second-pass scoring strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RerankStrategy {
    /// Re-embed candidates and score by cosine similarity.
    Cosine,
    /// Delegate to a cross-encoder `/rerank` endpoint.
    CrossEncoder,
}

/// Everything the pipeline needs; nothing in the core is hardcoded.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Root directory scanned for PDF files.
    pub corpus_dir: PathBuf,
    /// Extra web pages ingested alongside the corpus directory.
    pub web_pages: Vec<Url>,
    /// CSS selector applied to every web page.
    pub web_selector: String,
    /// Directory holding the persisted index artifact.
    pub index_dir: PathBuf,
    /// Credential for the embedding backend.
    pub embedding_api_key: String,
    /// OpenAI-compatible base URL for embeddings.
    pub embedding_base_url: String,
    /// Embedding model identity; recorded in the index manifest.
    pub embedding_model: String,
    /// Optional output dimension override.
    pub embedding_dimensions: Option<usize>,
    /// Inputs per embeddings request.
    pub embedding_batch_size: usize,
    /// Embedding requests in flight during index builds.
    pub embedding_concurrency: usize,
    /// Completion backend family.
    pub chat_provider: ChatProvider,
    /// Credential for the completion backend.
    pub chat_api_key: String,
    /// Base URL of the completion backend.
    pub chat_base_url: String,
    /// Completion model identity.
    pub chat_model: String,
    /// Sampling settings.
    pub chat: ChatSettings,
    /// Second-pass scoring strategy.
    pub rerank_strategy: RerankStrategy,
    /// Credential for the cross-encoder endpoint; defaults to the embedding key.
    pub rerank_api_key: Option<String>,
    /// Base URL of the cross-encoder endpoint.
    pub rerank_base_url: String,
    /// Cross-encoder model identity.
    pub rerank_model: String,
    /// Window sizing.
    pub chunker: ChunkerConfig,
    /// Near-duplicate cosine threshold (strict `>`).
    pub dedup_threshold: f32,
    /// Overfetch and final candidate counts.
    pub depth: RetrievalDepth,
    /// Cached question embeddings; 0 disables the cache.
    pub query_cache_size: usize,
    /// Rate-limit backoff shared by every HTTP client.
    pub retry: RetryPolicy,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Normalizer options.
    pub normalize: NormalizeOptions,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("pdfs"),
            web_pages: Vec::new(),
            web_selector: DEFAULT_SELECTOR.to_string(),
            index_dir: PathBuf::from("faiss_index"),
            embedding_api_key: String::new(),
            embedding_base_url: DEFAULT_MISTRAL_BASE.to_string(),
            embedding_model: "mistral-embed".to_string(),
            embedding_dimensions: None,
            embedding_batch_size: 32,
            embedding_concurrency: 4,
            chat_provider: ChatProvider::OpenAi,
            chat_api_key: String::new(),
            chat_base_url: DEFAULT_MISTRAL_BASE.to_string(),
            chat_model: "mistral-large-latest".to_string(),
            chat: ChatSettings::default(),
            rerank_strategy: RerankStrategy::Cosine,
            rerank_api_key: None,
            rerank_base_url: DEFAULT_RERANK_BASE.to_string(),
            rerank_model: "rerank-v3.5".to_string(),
            chunker: ChunkerConfig::default(),
            dedup_threshold: 0.9,
            depth: RetrievalDepth::default(),
            query_cache_size: 1024,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(60),
            normalize: NormalizeOptions::default(),
        }
    }
}

impl RagConfig {
    /// Checks tuning knobs and credentials. Any failure is fatal at startup.
    pub fn validate(&self) -> Result<()> {
        self.chunker.validate()?;
        if self.depth.top_n == 0 {
            return Err(RagError::Config("top_n must be positive".into()));
        }
        if self.depth.overfetch_k < self.depth.top_n {
            return Err(RagError::Config(format!(
                "overfetch_k ({}) must be at least top_n ({})",
                self.depth.overfetch_k, self.depth.top_n
            )));
        }
        if !(-1.0..=1.0).contains(&self.dedup_threshold) {
            return Err(RagError::Config(format!(
                "dedup threshold {} outside [-1, 1]",
                self.dedup_threshold
            )));
        }
        if !self.corpus_dir.is_dir() {
            return Err(RagError::Config(format!(
                "corpus directory {} does not exist",
                self.corpus_dir.display()
            )));
        }
        if self.embedding_api_key.trim().is_empty() {
            return Err(RagError::Config("missing embedding API key".into()));
        }
        if self.chat_api_key.trim().is_empty() {
            return Err(RagError::Config("missing chat API key".into()));
        }
        if self.rerank_strategy == RerankStrategy::CrossEncoder
            && self.rerank_key().trim().is_empty()
        {
            return Err(RagError::Config("missing rerank API key".into()));
        }
        Ok(())
    }

    /// Cross-encoder credential, falling back to the embedding key.
    pub fn rerank_key(&self) -> &str {
        self.rerank_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or(&self.embedding_api_key)
    }

    /// Sources to ingest: the corpus directory first, then each web page.
    pub fn sources(&self) -> Vec<SourceSpec> {
        let mut specs = vec![SourceSpec::Directory(self.corpus_dir.clone())];
        specs.extend(self.web_pages.iter().map(|url| SourceSpec::WebPage {
            url: url.clone(),
            selector: self.web_selector.clone(),
        }));
        specs
    }
}

/// Command-line / environment surface flattened into every binary.
#[derive(Args, Debug, Clone)]
pub struct RagArgs {
    /// Directory containing the PDF corpus
    #[arg(long, env = "PDFRAG_CORPUS_DIR", default_value = "pdfs")]
    pub corpus_dir: PathBuf,

    /// Web page to ingest in addition to the corpus (repeatable)
    #[arg(long = "web-page", env = "PDFRAG_WEB_PAGES", value_delimiter = ',')]
    pub web_pages: Vec<Url>,

    /// CSS selector used to extract text from web pages
    #[arg(long, env = "PDFRAG_WEB_SELECTOR", default_value = DEFAULT_SELECTOR)]
    pub web_selector: String,

    /// Directory holding the persisted vector index
    #[arg(long, env = "PDFRAG_INDEX_DIR", default_value = "faiss_index")]
    pub index_dir: PathBuf,

    /// API key for embeddings (and the default chat provider)
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    pub mistral_api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(long, env = "PDFRAG_OPENAI_BASE", default_value = DEFAULT_MISTRAL_BASE)]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(long, env = "PDFRAG_EMBEDDING_MODEL", default_value = "mistral-embed")]
    pub embedding_model: String,

    /// Optional embedding dimension override
    #[arg(long, env = "PDFRAG_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Max inputs per embedding request
    #[arg(long, env = "PDFRAG_EMBEDDING_BATCH", default_value_t = 32)]
    pub embedding_batch_size: usize,

    /// Embedding requests in flight while building the index
    #[arg(long, env = "PDFRAG_EMBEDDING_CONCURRENCY", default_value_t = 4)]
    pub embedding_concurrency: usize,

    /// Completion provider
    #[arg(long, env = "PDFRAG_CHAT_PROVIDER", value_enum, default_value_t = ChatProvider::OpenAi)]
    pub chat_provider: ChatProvider,

    /// Chat model for the OpenAI-compatible provider
    #[arg(long, env = "PDFRAG_CHAT_MODEL", default_value = "mistral-large-latest")]
    pub chat_model: String,

    /// Anthropic API key (required with --chat-provider anthropic)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Anthropic model identifier
    #[arg(
        long,
        env = "PDFRAG_ANTHROPIC_MODEL",
        default_value = "claude-3-5-sonnet-latest"
    )]
    pub anthropic_model: String,

    /// Sampling temperature for the answer model
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    /// Maximum tokens requested from the answer model
    #[arg(long, default_value_t = 1024)]
    pub max_completion_tokens: usize,

    /// Second-pass scoring strategy
    #[arg(long, env = "PDFRAG_RERANK", value_enum, default_value_t = RerankStrategy::Cosine)]
    pub rerank: RerankStrategy,

    /// API key for the cross-encoder endpoint (defaults to the embedding key)
    #[arg(long, env = "RERANK_API_KEY", hide_env_values = true)]
    pub rerank_api_key: Option<String>,

    /// Base URL for the cross-encoder endpoint
    #[arg(long, env = "PDFRAG_RERANK_BASE", default_value = DEFAULT_RERANK_BASE)]
    pub rerank_base_url: String,

    /// Cross-encoder model identifier
    #[arg(long, env = "PDFRAG_RERANK_MODEL", default_value = "rerank-v3.5")]
    pub rerank_model: String,

    /// Maximum characters per chunk
    #[arg(long, env = "PDFRAG_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, env = "PDFRAG_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Cosine similarity above which a document counts as a near-duplicate
    #[arg(long, env = "PDFRAG_DEDUP_THRESHOLD", default_value_t = 0.9)]
    pub dedup_threshold: f32,

    /// Candidates fetched from the index before reranking
    #[arg(long, default_value_t = 10)]
    pub overfetch_k: usize,

    /// Candidates kept after reranking
    #[arg(long, default_value_t = 3)]
    pub top_n: usize,

    /// Max cached query embeddings kept in memory (0 disables caching)
    #[arg(long, default_value_t = 1024)]
    pub embedding_cache_size: usize,

    /// Attempts per request when the backend answers 429
    #[arg(long, env = "PDFRAG_MAX_ATTEMPTS", default_value_t = 5)]
    pub max_attempts: usize,

    /// Seconds before backend requests time out
    #[arg(long, env = "PDFRAG_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Lowercase text during normalization (drops proper-noun casing)
    #[arg(long, default_value_t = false)]
    pub lowercase: bool,
}

impl RagArgs {
    /// Converts parsed arguments into a [`RagConfig`]; call `validate` afterwards.
    pub fn into_config(self) -> RagConfig {
        let defaults = RagConfig::default();
        let mistral_key = self.mistral_api_key.unwrap_or_default();
        let (chat_api_key, chat_base_url, chat_model) = match self.chat_provider {
            ChatProvider::OpenAi => (
                mistral_key.clone(),
                self.openai_base_url.clone(),
                self.chat_model,
            ),
            ChatProvider::Anthropic => (
                self.anthropic_api_key.unwrap_or_default(),
                DEFAULT_ANTHROPIC_BASE.to_string(),
                self.anthropic_model,
            ),
        };
        RagConfig {
            corpus_dir: self.corpus_dir,
            web_pages: self.web_pages,
            web_selector: self.web_selector,
            index_dir: self.index_dir,
            embedding_api_key: mistral_key,
            embedding_base_url: self.openai_base_url,
            embedding_model: self.embedding_model,
            embedding_dimensions: self.embedding_dimensions,
            embedding_batch_size: self.embedding_batch_size.max(1),
            embedding_concurrency: self.embedding_concurrency.max(1),
            chat_provider: self.chat_provider,
            chat_api_key,
            chat_base_url,
            chat_model,
            chat: ChatSettings {
                temperature: self.temperature,
                max_tokens: self.max_completion_tokens.max(1),
            },
            rerank_strategy: self.rerank,
            rerank_api_key: self.rerank_api_key,
            rerank_base_url: self.rerank_base_url,
            rerank_model: self.rerank_model,
            chunker: ChunkerConfig {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            },
            dedup_threshold: self.dedup_threshold,
            depth: RetrievalDepth {
                overfetch_k: self.overfetch_k,
                top_n: self.top_n,
            },
            query_cache_size: self.embedding_cache_size,
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                ..defaults.retry
            },
            request_timeout: Duration::from_secs(self.timeout_secs.max(1)),
            normalize: NormalizeOptions {
                lowercase: self.lowercase,
            },
        }
    }
}
