//! Query-time retrieval: embed once, overfetch from the index, rerank.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::document::{Embedding, ScoredCandidate};
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::rerank::{Query, Reranker};
use crate::vector_index::VectorIndex;

/// Candidate counts for the two retrieval passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalDepth {
    /// Candidates pulled from the index before reranking.
    pub overfetch_k: usize,
    /// Candidates kept after reranking.
    pub top_n: usize,
}

impl Default for RetrievalDepth {
    fn default() -> Self {
        Self {
            overfetch_k: 10,
            top_n: 3,
        }
    }
}

/// Embeds questions and runs the search + rerank passes.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    depth: RetrievalDepth,
    cache: Option<Mutex<LruCache<String, Embedding>>>,
}

impl Retriever {
    /// `cache_size` bounds the question-embedding LRU; 0 disables it.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        depth: RetrievalDepth,
        cache_size: usize,
    ) -> Self {
        Self {
            embedder,
            reranker,
            depth,
            cache: NonZeroUsize::new(cache_size).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Configured candidate counts.
    pub fn depth(&self) -> RetrievalDepth {
        self.depth
    }

    /// Embeds `question`, consulting the LRU cache first.
    pub async fn embed_query(&self, question: &str) -> Result<Query> {
        let key = question.trim();
        if key.is_empty() {
            return Err(RagError::InvalidRequest("question must not be empty".into()));
        }
        if let Some(cache) = &self.cache {
            if let Some(hit) = {
                let mut guard = cache.lock().await;
                guard.get(key).cloned()
            } {
                debug!("query embedding cache hit");
                return Ok(Query {
                    text: key.to_string(),
                    embedding: hit,
                });
            }
        }

        let embedding = self.embedder.embed(key).await?;
        if let Some(cache) = &self.cache {
            cache.lock().await.put(key.to_string(), embedding.clone());
        }
        Ok(Query {
            text: key.to_string(),
            embedding,
        })
    }

    /// Returns the reranked top candidates for `question`, best first.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        question: &str,
    ) -> Result<Vec<ScoredCandidate>> {
        let query = self.embed_query(question).await?;
        let candidates = index.search(&query.embedding, self.depth.overfetch_k);
        debug!(
            candidates = candidates.len(),
            best = candidates.first().map(|c| c.score),
            "index search complete"
        );
        let reranked = self
            .reranker
            .rerank(&query, candidates, self.depth.top_n)
            .await?;
        for candidate in &reranked {
            debug!(
                source = %candidate.chunk.metadata.source,
                chunk_id = candidate.chunk.chunk_id,
                score = candidate.score,
                reranker = self.reranker.name(),
                "reranked context"
            );
        }
        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Chunk, Metadata};
    use crate::rerank::CosineReranker;
    use crate::test_support::{KeywordEmbedder, MapEmbedder};

    fn chunk(id: usize, text: &str) -> Chunk {
        Chunk {
            chunk_id: id,
            text: text.to_string(),
            metadata: Metadata::new(format!("doc-{id}.pdf")),
            char_start: 0,
            char_end: text.len(),
        }
    }

    #[tokio::test]
    async fn retrieves_the_matching_chunk_first() {
        let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new(&[
            "interpreter",
            "compiler",
            "machine code",
            "garbage",
        ]));
        let chunks = vec![
            chunk(0, "A compiler translates source code into machine code ahead of time."),
            chunk(
                1,
                "An interpreter executes instructions directly without compiling to machine code first.",
            ),
            chunk(2, "Garbage collection reclaims unused memory."),
        ];
        let index = VectorIndex::build(chunks, embedder.as_ref(), 2).await.unwrap();
        let retriever = Retriever::new(
            embedder.clone(),
            Arc::new(CosineReranker::new(embedder)),
            RetrievalDepth {
                overfetch_k: 10,
                top_n: 2,
            },
            8,
        );
        let results = retriever
            .retrieve(&index, "What is an interpreter?")
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, 1);
        assert!(results[0].score > 0.5);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn cached_questions_skip_the_embedder() {
        let embedder = Arc::new(MapEmbedder::new(4).with("why?", vec![1.0, 0.0]));
        let retriever = Retriever::new(
            embedder.clone(),
            Arc::new(CosineReranker::new(embedder.clone())),
            RetrievalDepth::default(),
            4,
        );
        retriever.embed_query("why?").await.unwrap();
        let again = retriever.embed_query("  why?  ").await.unwrap();
        assert_eq!(again.embedding, vec![1.0, 0.0]);
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn blank_questions_are_rejected_before_embedding() {
        let embedder = Arc::new(MapEmbedder::new(4));
        let retriever = Retriever::new(
            embedder.clone(),
            Arc::new(CosineReranker::new(embedder.clone())),
            RetrievalDepth::default(),
            0,
        );
        let err = retriever.embed_query("   ").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidRequest(_)));
        assert_eq!(embedder.calls(), 0);
    }
}
