//! Anthropic `/v1/messages` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ChatModel, ChatSettings, SERVICE};
use crate::error::{RagError, Result};
use crate::retry::{post_json, RetryPolicy};

const API_VERSION: &str = "2023-06-01";

/// Chat client for the Anthropic messages API.
pub struct AnthropicChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    settings: ChatSettings,
    retry: RetryPolicy,
}

impl AnthropicChat {
    /// Builds a client for `{base_url}/v1/messages`.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        settings: ChatSettings,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RagError::Config("missing Anthropic API key".into()));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| RagError::Config("invalid Anthropic API key".into()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| RagError::Config(format!("failed to build Anthropic client: {err}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            model,
            settings,
            retry,
        })
    }
}

#[async_trait]
impl ChatModel for AnthropicChat {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![AnthropicContentBlock {
                    kind: "text",
                    text: prompt,
                }],
            }],
        };
        let parsed: AnthropicResponse =
            post_json(&self.client, &self.endpoint, &body, SERVICE, &self.retry).await?;
        let answer = collect_text(parsed);
        if answer.is_empty() {
            return Err(RagError::upstream(
                SERVICE,
                "Anthropic response missing text content",
            ));
        }
        Ok(answer)
    }
}

fn collect_text(response: AnthropicResponse) -> String {
    response
        .content
        .into_iter()
        .filter_map(|block| match block {
            AnthropicResponseBlock::Text { text } => Some(text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<AnthropicContentBlock<'a>>,
}

#[derive(Serialize)]
struct AnthropicContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
