//! Error taxonomy shared by ingestion, indexing and query-time retrieval.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T, E = RagError> = std::result::Result<T, E>;

/// Failures surfaced by the retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing credentials, paths or inconsistent tuning knobs. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The persisted index could not be deserialized or does not match the
    /// configured embedding space. Recovered by deleting and rebuilding.
    #[error("corrupt index at {path:?}: {reason}")]
    CorruptIndex {
        /// Artifact directory that failed to load.
        path: PathBuf,
        /// Human-readable cause.
        reason: String,
    },

    /// Backend answered HTTP 429 on every allowed attempt.
    #[error("{service} rate limited after {attempts} attempt(s)")]
    RateLimited {
        /// Backend label (embeddings, chat, rerank).
        service: &'static str,
        /// Attempts made before giving up.
        attempts: usize,
    },

    /// Non-2xx or malformed response from an upstream backend.
    #[error("{service} request failed: {message}")]
    Upstream {
        /// Backend label (embeddings, chat, rerank).
        service: &'static str,
        /// Status line or decoding failure.
        message: String,
    },

    /// The caller supplied an empty or missing question.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A corpus source could not be read or parsed.
    #[error("failed to ingest {source_id}: {message}")]
    Ingest {
        /// Path or URL of the failing source.
        source_id: String,
        /// Underlying cause.
        message: String,
    },

    /// Filesystem failure outside of corpus reads (index directory, etc).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Only rate-limit responses are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub(crate) fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
