//! The retrieval service: owns the single index instance and builds grounded
//! context for questions.
//!
//! The index is created on first use. Callers that arrive while it is loading
//! or building wait on the same lock, so at most one build ever runs; once it is
//! ready every request clones the shared `Arc` and searches without locking.
//! An unreadable corpus source is terminal: the failure is kept and returned to
//! later callers until [`RagService::rebuild`] is requested.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::chat::{AnthropicChat, ChatModel, OpenAiChat};
use crate::chunker::split_documents;
use crate::config::{ChatProvider, RagConfig, RerankStrategy};
use crate::dedup::filter_duplicates;
use crate::document::{Chunk, ScoredCandidate};
use crate::embedder::{Embedder, OpenAiEmbedder};
use crate::error::{RagError, Result};
use crate::loader::load_all;
use crate::normalizer::normalize_documents;
use crate::prompt::assemble;
use crate::rerank::{CosineReranker, CrossEncoderReranker, Reranker};
use crate::retriever::Retriever;
use crate::vector_index::VectorIndex;

/// Lifecycle of the shared index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// Nothing loaded yet.
    Unbuilt,
    /// Reading the persisted artifact.
    Loading,
    /// Ingesting the corpus and embedding chunks.
    Building,
    /// Searchable.
    Ready,
    /// Ingestion hit an unreadable source; only a rebuild leaves this state.
    Failed,
}

/// Snapshot reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Current lifecycle state.
    pub state: IndexState,
    /// Entries in the ready index (0 before that).
    pub entries: usize,
}

enum Slot {
    Empty,
    Ready(Arc<VectorIndex>),
    Failed { source_id: String, message: String },
}

/// Pipeline entry point shared by the HTTP handlers and the CLIs.
pub struct RagService {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    retriever: Retriever,
    http: reqwest::Client,
    index: Mutex<Slot>,
    state: watch::Sender<IndexState>,
    entries: AtomicUsize,
}

impl RagService {
    /// Wires the service from explicit collaborators.
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        reranker: Arc<dyn Reranker>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| RagError::Config(format!("failed to build HTTP client: {err}")))?;
        let retriever = Retriever::new(
            embedder.clone(),
            reranker,
            config.depth,
            config.query_cache_size,
        );
        Ok(Self {
            config,
            embedder,
            chat,
            retriever,
            http,
            index: Mutex::new(Slot::Empty),
            state: watch::Sender::new(IndexState::Unbuilt),
            entries: AtomicUsize::new(0),
        })
    }

    /// Validates `config` and builds the configured provider clients.
    pub fn from_config(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
            &config.embedding_api_key,
            &config.embedding_base_url,
            config.embedding_model.clone(),
            config.embedding_dimensions,
            config.request_timeout,
            config.embedding_batch_size,
            config.retry,
        )?);
        let chat: Arc<dyn ChatModel> = match config.chat_provider {
            ChatProvider::OpenAi => Arc::new(OpenAiChat::new(
                &config.chat_api_key,
                &config.chat_base_url,
                config.chat_model.clone(),
                config.chat,
                config.request_timeout,
                config.retry,
            )?),
            ChatProvider::Anthropic => Arc::new(AnthropicChat::new(
                &config.chat_api_key,
                &config.chat_base_url,
                config.chat_model.clone(),
                config.chat,
                config.request_timeout,
                config.retry,
            )?),
        };
        let reranker: Arc<dyn Reranker> = match config.rerank_strategy {
            RerankStrategy::Cosine => Arc::new(CosineReranker::new(embedder.clone())),
            RerankStrategy::CrossEncoder => Arc::new(CrossEncoderReranker::new(
                config.rerank_key(),
                &config.rerank_base_url,
                config.rerank_model.clone(),
                config.request_timeout,
                config.retry,
            )?),
        };
        info!(
            embedding_model = embedder.model_id(),
            chat_model = chat.model_id(),
            reranker = reranker.name(),
            "rag service configured"
        );
        Self::new(config, embedder, chat, reranker)
    }

    /// Effective configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Current index lifecycle state and size.
    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            state: *self.state.borrow(),
            entries: self.entries.load(Ordering::Acquire),
        }
    }

    /// Returns the shared index, loading or building it on first use.
    pub async fn index(&self) -> Result<Arc<VectorIndex>> {
        let mut guard = self.index.lock().await;
        match &*guard {
            Slot::Ready(index) => return Ok(index.clone()),
            Slot::Failed { source_id, message } => {
                return Err(RagError::Ingest {
                    source_id: source_id.clone(),
                    message: message.clone(),
                })
            }
            Slot::Empty => {}
        }
        let outcome = self.load_or_build().await;
        self.install(&mut guard, outcome)
    }

    /// Discards the persisted artifact and any loaded index, then rebuilds.
    pub async fn rebuild(&self) -> Result<Arc<VectorIndex>> {
        let mut guard = self.index.lock().await;
        *guard = Slot::Empty;
        let outcome = async {
            remove_artifact(&self.config.index_dir).await?;
            self.build_and_save().await
        }
        .await;
        self.install(&mut guard, outcome)
    }

    fn install(
        &self,
        slot: &mut Slot,
        outcome: Result<VectorIndex>,
    ) -> Result<Arc<VectorIndex>> {
        match outcome {
            Ok(index) => {
                let index = Arc::new(index);
                self.entries.store(index.len(), Ordering::Release);
                *slot = Slot::Ready(index.clone());
                self.state.send_replace(IndexState::Ready);
                Ok(index)
            }
            Err(RagError::Ingest { source_id, message }) => {
                error!(source = %source_id, %message, "corpus ingestion failed");
                self.entries.store(0, Ordering::Release);
                self.state.send_replace(IndexState::Failed);
                *slot = Slot::Failed {
                    source_id: source_id.clone(),
                    message: message.clone(),
                };
                Err(RagError::Ingest { source_id, message })
            }
            Err(err) => {
                self.entries.store(0, Ordering::Release);
                self.state.send_replace(IndexState::Unbuilt);
                Err(err)
            }
        }
    }

    async fn load_or_build(&self) -> Result<VectorIndex> {
        let dir = &self.config.index_dir;
        if tokio::fs::try_exists(dir).await? {
            self.state.send_replace(IndexState::Loading);
            match VectorIndex::load(dir, self.embedder.model_id()).await {
                Ok(index) => return Ok(index),
                Err(RagError::CorruptIndex { path, reason }) => {
                    warn!(path = %path.display(), %reason, "discarding unusable index");
                    remove_artifact(dir).await?;
                }
                Err(err) => return Err(err),
            }
        }
        self.build_and_save().await
    }

    async fn build_and_save(&self) -> Result<VectorIndex> {
        self.state.send_replace(IndexState::Building);
        let chunks = self.ingest().await?;
        let index = VectorIndex::build(
            chunks,
            self.embedder.as_ref(),
            self.config.embedding_concurrency,
        )
        .await?;
        index.save(&self.config.index_dir).await?;
        Ok(index)
    }

    /// Load, normalize, deduplicate and chunk every configured source.
    pub async fn ingest(&self) -> Result<Vec<Chunk>> {
        let mut docs = load_all(&self.config.sources(), &self.http).await?;
        normalize_documents(&mut docs, self.config.normalize);
        let docs =
            filter_duplicates(docs, self.embedder.as_ref(), self.config.dedup_threshold).await?;
        let chunks = split_documents(&docs, &self.config.chunker)?;
        info!(
            documents = docs.len(),
            chunks = chunks.len(),
            chunk_size = self.config.chunker.chunk_size,
            chunk_overlap = self.config.chunker.chunk_overlap,
            "corpus ingested"
        );
        Ok(chunks)
    }

    /// Reranked top chunks for `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredCandidate>> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidRequest("Missing question.".into()));
        }
        let index = self.index().await?;
        self.retriever.retrieve(&index, question).await
    }

    /// Retrieves, assembles the grounded prompt and returns the generator's
    /// reply, which is either grounded context or the sentinel.
    pub async fn build_rag_context(&self, question: &str) -> Result<String> {
        let top = self.retrieve(question).await?;
        let chunks: Vec<Chunk> = top.into_iter().map(|candidate| candidate.chunk).collect();
        let prompt = assemble(question.trim(), &chunks);
        let reply = self.chat.complete(&prompt).await?;
        if reply.trim().is_empty() {
            return Err(RagError::upstream("chat", "empty completion"));
        }
        info!(chunks = chunks.len(), reply_chars = reply.len(), "rag context built");
        Ok(reply)
    }

    /// Sends an arbitrary prompt to the configured chat model.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat.complete(prompt).await
    }
}

async fn remove_artifact(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
