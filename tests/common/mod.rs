#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use pdfrag::{ChatModel, Embedder, Embedding, RagError, Result};

pub const INTERPRETER: &str =
    "An interpreter executes instructions directly without compiling to machine code first.";

/// Serves `router` on an ephemeral port and returns its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Counts topic keywords; one dimension per keyword.
pub struct TopicEmbedder {
    topics: Vec<&'static str>,
}

impl TopicEmbedder {
    pub fn new(topics: &[&'static str]) -> Self {
        Self {
            topics: topics.to_vec(),
        }
    }

    pub fn programming() -> Self {
        Self::new(&["interpreter", "compiler", "machine code", "memory", "mars"])
    }
}

#[async_trait]
impl Embedder for TopicEmbedder {
    fn model_id(&self) -> &str {
        "topic-embedder"
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>> {
        Ok(inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                self.topics
                    .iter()
                    .map(|topic| lower.matches(topic).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Returns a canned reply (or failure) and records prompts.
pub struct CannedChat {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl CannedChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for CannedChat {
    fn model_id(&self) -> &str {
        "canned-chat"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().ok_or_else(|| RagError::Upstream {
            service: "chat",
            message: "503 Service Unavailable".into(),
        })
    }
}
