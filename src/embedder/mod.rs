//! Embedding contract shared by deduplication, indexing and query time.
//!
//! A single [`Embedder`] instance is threaded through every phase so that the
//! dedup filter, the stored index vectors and the query vectors all live in the
//! same embedding space.

pub mod openai;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};

use crate::document::Embedding;
use crate::error::{RagError, Result};

pub use openai::OpenAiEmbedder;

/// Text to vector function; pure apart from network failures and rate limits.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identity recorded in the persisted index.
    fn model_id(&self) -> &str;

    /// Maximum inputs accepted by one [`Embedder::embed_batch`] call.
    fn batch_size(&self) -> usize {
        32
    }

    /// Embeds a batch, returning vectors in input order.
    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut vectors = self.embed_batch(&[text]).await?;
        match (vectors.pop(), vectors.is_empty()) {
            (Some(vector), true) => Ok(vector),
            _ => Err(RagError::upstream(
                "embeddings",
                "expected exactly one embedding for one input",
            )),
        }
    }
}

/// Embeds `texts` in batches of [`Embedder::batch_size`], keeping up to
/// `concurrency` batches in flight. Output order matches input order and any
/// failed batch fails the whole call.
pub async fn embed_all(
    embedder: &dyn Embedder,
    texts: &[&str],
    concurrency: usize,
) -> Result<Vec<Embedding>> {
    let batch_size = embedder.batch_size().max(1);
    let owned: Vec<Vec<String>> = texts
        .chunks(batch_size)
        .map(|batch| batch.iter().map(|text| (*text).to_owned()).collect())
        .collect();
    let batches: Vec<Vec<Embedding>> = stream::iter(owned)
        .map(|batch| async move {
            let inputs: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = embedder.embed_batch(&inputs).await?;
            if vectors.len() != inputs.len() {
                return Err(RagError::upstream(
                    "embeddings",
                    format!(
                        "received {} embeddings for {} inputs",
                        vectors.len(),
                        inputs.len()
                    ),
                ));
            }
            Ok(vectors)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;
    Ok(batches.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MapEmbedder;

    #[tokio::test]
    async fn embed_all_preserves_input_order_across_batches() {
        let embedder = MapEmbedder::new(2)
            .with("a", vec![1.0, 0.0])
            .with("b", vec![0.0, 1.0])
            .with("c", vec![1.0, 1.0]);
        let vectors = embed_all(&embedder, &["c", "a", "b", "a", "c"], 3)
            .await
            .unwrap();
        assert_eq!(
            vectors,
            vec![
                vec![1.0, 1.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0]
            ]
        );
        assert_eq!(embedder.calls(), 3);
    }

    #[tokio::test]
    async fn one_failing_batch_fails_the_call() {
        let embedder = MapEmbedder::new(1).with("ok", vec![1.0]).failing_on("bad");
        let err = embed_all(&embedder, &["ok", "bad", "ok"], 2).await.unwrap_err();
        assert!(matches!(err, RagError::Upstream { .. }));
    }
}
