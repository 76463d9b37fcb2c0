#![warn(missing_docs)]
//! Retrieval-augmented context builder over a PDF (and web page) corpus.
//!
//! Ingestion runs loader → normalizer → dedup → chunker → vector index once;
//! each question then runs retriever → index search → rerank → prompt
//! assembly → chat completion. [`RagService`] ties the stages together.

pub mod chat;
pub mod chunker;
pub mod config;
pub mod dedup;
pub mod document;
pub mod embedder;
pub mod error;
pub mod http;
pub mod loader;
pub mod normalizer;
pub mod prompt;
pub mod rerank;
pub mod retriever;
pub mod retry;
pub mod service;
pub mod similarity;
pub mod vector_index;

#[cfg(test)]
mod test_support;

pub use chat::{ChatModel, ChatSettings};
pub use chunker::{split_documents, ChunkerConfig};
pub use config::{ChatProvider, RagArgs, RagConfig, RerankStrategy};
pub use dedup::filter_duplicates;
pub use document::{Chunk, Document, Embedding, Metadata, ScoredCandidate};
pub use embedder::Embedder;
pub use error::{RagError, Result};
pub use loader::{Loader, SourceKind, SourceSpec};
pub use normalizer::{normalize, NormalizeOptions};
pub use prompt::{assemble, is_no_answer, resolve_prompt, ungrounded_prompt, SENTINEL};
pub use rerank::{CosineReranker, CrossEncoderReranker, Query, Reranker};
pub use retriever::{RetrievalDepth, Retriever};
pub use retry::RetryPolicy;
pub use service::{IndexState, IndexStatus, RagService};
pub use similarity::cosine_similarity;
pub use vector_index::VectorIndex;
