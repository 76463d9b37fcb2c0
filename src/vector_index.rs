//! Exact nearest-neighbour index over chunk embeddings with an on-disk artifact.
//!
//! The artifact directory holds two files:
//!
//! * `entries.jsonl`: one [`IndexEntry`] (chunk payload + embedding) per line.
//! * `index.json`: the [`IndexManifest`], written last so that a directory
//!   without it is recognisably incomplete.
//!
//! Loading never re-embeds. Any mismatch between the manifest, the payload and
//! the configured embedding model is reported as [`RagError::CorruptIndex`] so
//! the caller can delete the directory and rebuild from the corpus.

use std::cmp::Ordering;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::document::{Chunk, Embedding, ScoredCandidate};
use crate::embedder::{embed_all, Embedder};
use crate::error::{RagError, Result};
use crate::similarity::cosine_similarity;

/// Format marker stored in every manifest.
pub const INDEX_FORMAT: &str = "pdfrag-index/v1";
const MANIFEST_FILE: &str = "index.json";
const ENTRIES_FILE: &str = "entries.jsonl";

/// A chunk and the embedding computed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Stored chunk payload.
    pub chunk: Chunk,
    /// Embedding of `chunk.text`.
    pub embedding: Embedding,
}

/// Header describing a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Always [`INDEX_FORMAT`].
    pub format: String,
    /// Embedding model the vectors were computed with.
    pub embedding_model: String,
    /// Length of every stored vector (0 for an empty index).
    pub dimensions: usize,
    /// Number of lines in `entries.jsonl`.
    pub entry_count: usize,
}

/// In-memory index; immutable once built or loaded.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedding_model: String,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embeds every chunk (batched, up to `concurrency` requests in flight) and
    /// pairs each vector back onto its chunk.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        concurrency: usize,
    ) -> Result<Self> {
        let started = Instant::now();
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let embeddings = embed_all(embedder, &texts, concurrency).await?;
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        let index = Self::from_entries(embedder.model_id(), entries)
            .map_err(|reason| RagError::upstream("embeddings", reason))?;
        info!(
            entries = index.len(),
            dimensions = index.dimensions,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector index built"
        );
        Ok(index)
    }

    fn from_entries(
        embedding_model: &str,
        entries: Vec<IndexEntry>,
    ) -> std::result::Result<Self, String> {
        let dimensions = entries.first().map_or(0, |entry| entry.embedding.len());
        if let Some(bad) = entries
            .iter()
            .find(|entry| entry.embedding.len() != dimensions)
        {
            return Err(format!(
                "chunk {} has {} dimensions, expected {dimensions}",
                bad.chunk.chunk_id,
                bad.embedding.len()
            ));
        }
        Ok(Self {
            embedding_model: embedding_model.to_string(),
            dimensions,
            entries,
        })
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no chunk was indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Model the stored vectors belong to.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Vector length shared by all entries.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Stored entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Returns up to `k` chunks by descending cosine similarity. Equal scores
    /// keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredCandidate> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, cosine_similarity(query, &entry.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(idx, score)| ScoredCandidate {
                chunk: self.entries[idx].chunk.clone(),
                score,
            })
            .collect()
    }

    /// Writes the artifact into `dir`, creating it if needed.
    pub async fn save(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        let mut writer = tokio::io::BufWriter::new(
            tokio::fs::File::create(dir.join(ENTRIES_FILE)).await?,
        );
        for entry in &self.entries {
            let mut line = serde_json::to_vec(entry).map_err(std::io::Error::other)?;
            line.push(b'\n');
            writer.write_all(&line).await?;
        }
        writer.flush().await?;

        let manifest = IndexManifest {
            format: INDEX_FORMAT.to_string(),
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions,
            entry_count: self.entries.len(),
        };
        let bytes = serde_json::to_vec_pretty(&manifest).map_err(std::io::Error::other)?;
        tokio::fs::write(dir.join(MANIFEST_FILE), bytes).await?;
        info!(path = %dir.display(), entries = self.entries.len(), "vector index saved");
        Ok(())
    }

    /// Reads a previously saved artifact. Every failure, including a missing
    /// directory, is a [`RagError::CorruptIndex`].
    pub async fn load(dir: &Path, expected_model: &str) -> Result<Self> {
        let started = Instant::now();
        let manifest_bytes = tokio::fs::read(dir.join(MANIFEST_FILE))
            .await
            .map_err(|err| RagError::corrupt(dir, format!("manifest unreadable: {err}")))?;
        let manifest: IndexManifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|err| RagError::corrupt(dir, format!("manifest malformed: {err}")))?;
        if manifest.format != INDEX_FORMAT {
            return Err(RagError::corrupt(
                dir,
                format!("unknown format marker {:?}", manifest.format),
            ));
        }
        if manifest.embedding_model != expected_model {
            return Err(RagError::corrupt(
                dir,
                format!(
                    "built with embedding model {:?}, configured model is {expected_model:?}",
                    manifest.embedding_model
                ),
            ));
        }

        let payload = tokio::fs::read_to_string(dir.join(ENTRIES_FILE))
            .await
            .map_err(|err| RagError::corrupt(dir, format!("entries unreadable: {err}")))?;
        let entries = payload
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(line_no, line)| {
                serde_json::from_str::<IndexEntry>(line).map_err(|err| {
                    RagError::corrupt(dir, format!("entry {} malformed: {err}", line_no + 1))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if entries.len() != manifest.entry_count {
            return Err(RagError::corrupt(
                dir,
                format!(
                    "manifest lists {} entries, found {}",
                    manifest.entry_count,
                    entries.len()
                ),
            ));
        }
        let index = Self::from_entries(&manifest.embedding_model, entries)
            .map_err(|reason| RagError::corrupt(dir, reason))?;
        if !index.is_empty() && index.dimensions != manifest.dimensions {
            return Err(RagError::corrupt(
                dir,
                format!(
                    "manifest lists {} dimensions, entries have {}",
                    manifest.dimensions, index.dimensions
                ),
            ));
        }
        info!(
            path = %dir.display(),
            entries = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector index loaded"
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use crate::test_support::{KeywordEmbedder, MapEmbedder};

    fn chunk(id: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: id,
            text: text.to_string(),
            metadata: Metadata::new("corpus/a.pdf").with("page", id as u64 + 1),
            char_start: 0,
            char_end: text.len(),
        }
    }

    fn embedder() -> KeywordEmbedder {
        KeywordEmbedder::new(&["rust", "python", "interpreter", "compiler"])
    }

    async fn sample_index() -> VectorIndex {
        let chunks = vec![
            chunk(0, "rust compiler internals"),
            chunk(1, "python interpreter loop"),
            chunk(2, "rust rust and more rust"),
            chunk(3, "an interpreter executes code"),
        ];
        VectorIndex::build(chunks, &embedder(), 2).await.unwrap()
    }

    fn ids(results: &[ScoredCandidate]) -> Vec<usize> {
        results.iter().map(|c| c.chunk.chunk_id).collect()
    }

    #[tokio::test]
    async fn search_orders_by_descending_similarity() {
        let index = sample_index().await;
        assert_eq!(index.len(), 4);
        assert_eq!(index.dimensions(), 4);
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2);
        assert_eq!(ids(&results), vec![2, 0]);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn k_larger_than_index_returns_everything() {
        let index = sample_index().await;
        assert_eq!(index.search(&[0.0, 0.0, 1.0, 0.0], 50).len(), 4);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let chunks = vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")];
        let embedder = MapEmbedder::new(4)
            .with("a", vec![0.0, 1.0])
            .with("b", vec![1.0, 0.0])
            .with("c", vec![0.0, 2.0]);
        let index = VectorIndex::build(chunks, &embedder, 1).await.unwrap();
        let results = index.search(&[0.0, 1.0], 3);
        assert_eq!(ids(&results), vec![0, 2, 1]);
    }

    #[tokio::test]
    async fn round_trip_preserves_search_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faiss");
        let index = sample_index().await;
        index.save(&path).await.unwrap();

        let loaded = VectorIndex::load(&path, "keyword-embedder").await.unwrap();
        assert_eq!(loaded.entries(), index.entries());
        for query in [[1.0, 0.0, 1.0, 0.0], [0.0, 1.0, 1.0, 0.0], [0.2, 0.0, 0.0, 3.0]] {
            let fresh = index.search(&query, 3);
            let restored = loaded.search(&query, 3);
            assert_eq!(ids(&fresh), ids(&restored));
            for (a, b) in fresh.iter().zip(&restored) {
                assert!((a.score - b.score).abs() < 1e-6);
            }
        }
    }

    #[tokio::test]
    async fn empty_index_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::build(Vec::new(), &embedder(), 4).await.unwrap();
        index.save(dir.path()).await.unwrap();
        let loaded = VectorIndex::load(dir.path(), "keyword-embedder").await.unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.search(&[1.0], 3).is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(&dir.path().join("absent"), "keyword-embedder")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex { .. }));
    }

    #[tokio::test]
    async fn model_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().await.save(dir.path()).await.unwrap();
        let err = VectorIndex::load(dir.path(), "mistral-embed")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex { .. }));
    }

    #[tokio::test]
    async fn truncated_payload_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().await.save(dir.path()).await.unwrap();
        let entries = dir.path().join(ENTRIES_FILE);
        let payload = std::fs::read_to_string(&entries).unwrap();
        let first_line = payload.lines().next().unwrap();
        std::fs::write(&entries, format!("{first_line}\n{{\"chunk\":")).unwrap();
        let err = VectorIndex::load(dir.path(), "keyword-embedder")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex { .. }));
    }

    #[tokio::test]
    async fn inconsistent_dimensions_fail_the_build() {
        let embedder = MapEmbedder::new(4)
            .with("a", vec![1.0, 0.0])
            .with("b", vec![1.0]);
        let err = VectorIndex::build(vec![chunk(0, "a"), chunk(1, "b")], &embedder, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Upstream { .. }));
    }
}
