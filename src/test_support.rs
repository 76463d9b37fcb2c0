//! In-process doubles for the embedding and chat backends.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::ChatModel;
use crate::document::Embedding;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};

/// Embedder backed by a fixed text to vector table.
pub(crate) struct MapEmbedder {
    batch_size: usize,
    vectors: HashMap<String, Embedding>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MapEmbedder {
    pub(crate) fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            vectors: HashMap::new(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Embedding) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub(crate) fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    /// Number of `embed_batch` invocations so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MapEmbedder {
    fn model_id(&self) -> &str {
        "map-embedder"
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        inputs
            .iter()
            .map(|text| {
                if self.failing.contains(*text) {
                    return Err(RagError::upstream("embeddings", format!("refused {text:?}")));
                }
                self.vectors
                    .get(*text)
                    .cloned()
                    .ok_or_else(|| RagError::upstream("embeddings", format!("no vector for {text:?}")))
            })
            .collect()
    }
}

/// Embedder that counts topic keywords; one dimension per keyword.
pub(crate) struct KeywordEmbedder {
    keywords: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub(crate) fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
        }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-embedder"
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>> {
        Ok(inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                self.keywords
                    .iter()
                    .map(|kw| lower.matches(kw).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Chat model that returns a canned reply and records every prompt.
pub(crate) struct ScriptedChat {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_id(&self) -> &str {
        "scripted-chat"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply
            .clone()
            .map_err(|message| RagError::upstream("chat", message))
    }
}
