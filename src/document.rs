//! Corpus data model shared by the loader, chunker and vector index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed-length embedding vector.
pub type Embedding = Vec<f32>;

/// Provenance attached to every document and inherited by its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Stable identifier of the originating file or page.
    pub source: String,
    /// Loader-specific extras (page number, checksum, kind...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    /// Metadata carrying only a source identifier.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Adds an extra field, replacing any previous value.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Looks up an extra field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// A unit of loaded text (one PDF page, one web page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Extracted (and later normalized) text.
    pub text: String,
    /// Provenance.
    pub metadata: Metadata,
}

impl Document {
    /// Builds a document.
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// Bounded slice of a document used as the atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk in the ingestion order.
    pub chunk_id: usize,
    /// Chunk body, a verbatim slice of the parent document text.
    pub text: String,
    /// Metadata inherited unchanged from the parent document.
    pub metadata: Metadata,
    /// Byte offset of the chunk within the parent document text.
    pub char_start: usize,
    /// Exclusive byte end offset within the parent document text.
    pub char_end: usize,
}

/// A chunk paired with a similarity or rerank score; produced per query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    /// Retrieved chunk.
    pub chunk: Chunk,
    /// Higher is more relevant.
    pub score: f32,
}
