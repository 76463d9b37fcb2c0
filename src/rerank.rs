//! Second-pass scoring over the oversampled candidate set.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Embedding, ScoredCandidate};
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::retry::{post_json, RetryPolicy};
use crate::similarity::cosine_similarity;

const SERVICE: &str = "rerank";

/// A question together with its embedding, computed once per request.
#[derive(Debug, Clone)]
pub struct Query {
    /// Question text as asked.
    pub text: String,
    /// Embedding of `text`.
    pub embedding: Embedding,
}

/// Rescoring strategy; implementations are interchangeable.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Returns at most `top_n` candidates, strictly ordered by descending
    /// rerank score. Candidates without a score are scored 0.
    async fn rerank(
        &self,
        query: &Query,
        candidates: Vec<ScoredCandidate>,
        top_n: usize,
    ) -> Result<Vec<ScoredCandidate>>;
}

/// Stable descending sort followed by truncation.
pub(crate) fn keep_best(mut scored: Vec<ScoredCandidate>, top_n: usize) -> Vec<ScoredCandidate> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(top_n);
    scored
}

/// Re-embeds each candidate's text and scores it against the query embedding.
pub struct CosineReranker {
    embedder: Arc<dyn Embedder>,
}

impl CosineReranker {
    /// Uses the same embedder as the index so scores share one space.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Reranker for CosineReranker {
    fn name(&self) -> &'static str {
        "cosine"
    }

    async fn rerank(
        &self,
        query: &Query,
        candidates: Vec<ScoredCandidate>,
        top_n: usize,
    ) -> Result<Vec<ScoredCandidate>> {
        let embedder = self.embedder.as_ref();
        let rescored = try_join_all(candidates.into_iter().map(|candidate| async move {
            let embedding = embedder.embed(&candidate.chunk.text).await?;
            Ok::<_, RagError>(ScoredCandidate {
                score: cosine_similarity(&query.embedding, &embedding),
                chunk: candidate.chunk,
            })
        }))
        .await?;
        Ok(keep_best(rescored, top_n))
    }
}

/// Client for a cross-encoder `/rerank` endpoint (Cohere/Jina/Mistral style).
pub struct CrossEncoderReranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    retry: RetryPolicy,
}

impl CrossEncoderReranker {
    /// Builds a client for `{base_url}/rerank`.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RagError::Config("missing rerank API key".into()));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .map_err(|_| RagError::Config("invalid rerank API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| RagError::Config(format!("failed to build rerank client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/rerank", base_url.trim_end_matches('/')),
            model,
            retry,
        })
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    fn name(&self) -> &'static str {
        "cross-encoder"
    }

    async fn rerank(
        &self,
        query: &Query,
        candidates: Vec<ScoredCandidate>,
        top_n: usize,
    ) -> Result<Vec<ScoredCandidate>> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        let documents: Vec<&str> = candidates.iter().map(|c| c.chunk.text.as_str()).collect();
        let request = RerankRequest {
            model: &self.model,
            query: &query.text,
            documents: &documents,
            top_n,
        };
        let response: RerankResponse =
            post_json(&self.client, &self.endpoint, &request, SERVICE, &self.retry).await?;

        let mut scores = vec![0.0f32; candidates.len()];
        for result in response.results {
            let Some(slot) = scores.get_mut(result.index) else {
                return Err(RagError::upstream(
                    SERVICE,
                    format!(
                        "result index {} out of range for {} documents",
                        result.index,
                        candidates.len()
                    ),
                ));
            };
            *slot = result
                .relevance_score
                .filter(|score| score.is_finite())
                .unwrap_or(0.0);
        }
        let rescored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, score)| ScoredCandidate {
                chunk: candidate.chunk,
                score,
            })
            .collect();
        debug!(documents = rescored.len(), top_n, "cross-encoder scores received");
        Ok(keep_best(rescored, top_n))
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    #[serde(default)]
    relevance_score: Option<f32>,
}
