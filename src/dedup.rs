//! Greedy near-duplicate filter over document embeddings.

use tracing::{debug, info};

use crate::document::{Document, Embedding};
use crate::embedder::Embedder;
use crate::error::Result;
use crate::similarity::cosine_similarity;

/// Keeps documents in their original order, dropping any whose cosine
/// similarity to an already accepted document is strictly greater than
/// `threshold`. Empty documents are skipped without being embedded.
///
/// Quadratic in the accepted set; this runs once per ingestion, never per request.
pub async fn filter_duplicates(
    docs: Vec<Document>,
    embedder: &dyn Embedder,
    threshold: f32,
) -> Result<Vec<Document>> {
    let total = docs.len();
    let mut accepted = Vec::new();
    let mut seen: Vec<Embedding> = Vec::new();

    for doc in docs {
        if doc.text.trim().is_empty() {
            continue;
        }
        let embedding = embedder.embed(&doc.text).await?;
        let duplicate_of = seen
            .iter()
            .position(|existing| cosine_similarity(existing, &embedding) > threshold);
        match duplicate_of {
            Some(idx) => debug!(
                source = %doc.metadata.source,
                kept = %accepted_source(&accepted, idx),
                "dropping near-duplicate"
            ),
            None => {
                seen.push(embedding);
                accepted.push(doc);
            }
        }
    }

    info!(
        before = total,
        after = accepted.len(),
        threshold,
        "near-duplicate filter applied"
    );
    Ok(accepted)
}

fn accepted_source(accepted: &[Document], idx: usize) -> &str {
    accepted
        .get(idx)
        .map(|doc| doc.metadata.source.as_str())
        .unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use crate::similarity::cosine_similarity;
    use crate::test_support::MapEmbedder;

    fn doc(text: &str) -> Document {
        Document::new(text, Metadata::new(format!("{text}.pdf")))
    }

    fn texts(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.text.as_str()).collect()
    }

    #[tokio::test]
    async fn drops_documents_above_threshold() {
        let embedder = MapEmbedder::new(8)
            .with("a", vec![1.0, 0.0])
            .with("a-copy", vec![0.99, 0.05])
            .with("b", vec![0.0, 1.0]);
        let kept = filter_duplicates(vec![doc("a"), doc("a-copy"), doc("b")], &embedder, 0.9)
            .await
            .unwrap();
        assert_eq!(texts(&kept), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn similarity_equal_to_threshold_is_not_a_duplicate() {
        let embedder = MapEmbedder::new(8)
            .with("x", vec![1.0, 0.0])
            .with("y", vec![1.0, 1.0]);
        let threshold = cosine_similarity(&[1.0, 0.0], &[1.0, 1.0]);
        let kept = filter_duplicates(vec![doc("x"), doc("y")], &embedder, threshold)
            .await
            .unwrap();
        assert_eq!(texts(&kept), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn empty_documents_are_skipped_without_embedding() {
        let embedder = MapEmbedder::new(8).with("a", vec![1.0]);
        let kept = filter_duplicates(vec![doc(""), doc("a"), doc("  ")], &embedder, 0.9)
            .await
            .unwrap();
        assert_eq!(texts(&kept), vec!["a"]);
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn zero_vectors_never_match() {
        let embedder = MapEmbedder::new(8)
            .with("blank-1", vec![0.0, 0.0])
            .with("blank-2", vec![0.0, 0.0]);
        let kept = filter_duplicates(vec![doc("blank-1"), doc("blank-2")], &embedder, 0.0)
            .await
            .unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[tokio::test]
    async fn accepted_set_is_pairwise_below_threshold() {
        let vectors = [
            ("d0", vec![1.0, 0.0, 0.0]),
            ("d1", vec![0.95, 0.1, 0.0]),
            ("d2", vec![0.0, 1.0, 0.0]),
            ("d3", vec![0.1, 0.9, 0.1]),
            ("d4", vec![0.0, 0.0, 1.0]),
            ("d5", vec![0.6, 0.6, 0.5]),
        ];
        let mut embedder = MapEmbedder::new(8);
        for (text, v) in &vectors {
            embedder = embedder.with(text, v.clone());
        }
        let threshold = 0.8;
        let docs: Vec<Document> = vectors.iter().map(|(t, _)| doc(t)).collect();
        let kept = filter_duplicates(docs, &embedder, threshold).await.unwrap();
        let kept_vectors: Vec<&Vec<f32>> = kept
            .iter()
            .map(|d| &vectors.iter().find(|(t, _)| *t == d.text).unwrap().1)
            .collect();
        for (i, a) in kept_vectors.iter().enumerate() {
            for b in kept_vectors.iter().skip(i + 1) {
                assert!(cosine_similarity(a, b) <= threshold);
            }
        }
        assert_eq!(texts(&kept), vec!["d0", "d2", "d4", "d5"]);
    }

    #[tokio::test]
    async fn embedding_failures_abort_the_filter() {
        let embedder = MapEmbedder::new(8).with("a", vec![1.0]).failing_on("b");
        assert!(filter_duplicates(vec![doc("a"), doc("b")], &embedder, 0.9)
            .await
            .is_err());
    }
}
