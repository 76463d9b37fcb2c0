//! Web page loader: fetches one HTML page and keeps the text of selected elements.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::{Loader, SourceKind};
use crate::document::{Document, Metadata};
use crate::error::{RagError, Result};

/// Default selector, paragraphs only.
pub const DEFAULT_SELECTOR: &str = "p";

/// Loads a single page; yields one document and is then exhausted.
pub struct WebPageLoader {
    client: reqwest::Client,
    url: Url,
    selector: Selector,
    done: bool,
}

impl WebPageLoader {
    /// Builds a loader; an unparsable selector is a configuration error.
    pub fn new(client: reqwest::Client, url: Url, selector: &str) -> Result<Self> {
        let selector = Selector::parse(selector)
            .map_err(|err| RagError::Config(format!("invalid CSS selector {selector:?}: {err}")))?;
        Ok(Self {
            client,
            url,
            selector,
            done: false,
        })
    }

    async fn fetch(&self) -> Result<String> {
        let ingest_err = |message: String| RagError::Ingest {
            source_id: self.url.to_string(),
            message,
        };
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| ingest_err(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ingest_err(format!("GET returned {status}")));
        }
        resp.text().await.map_err(|err| ingest_err(err.to_string()))
    }
}

#[async_trait]
impl Loader for WebPageLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::WebPage
    }

    async fn next_source(&mut self) -> Result<Option<Vec<Document>>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let html = self.fetch().await?;
        let text = extract_selected(&html, &self.selector);
        debug!(url = %self.url, chars = text.len(), "web page loaded");
        let metadata = Metadata::new(self.url.as_str()).with("kind", SourceKind::WebPage.label());
        Ok(Some(vec![Document::new(text, metadata)]))
    }
}

/// Concatenates the text of every element matching `selector`, one element per line.
pub fn extract_selected(html: &str, selector: &Selector) -> String {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .map(|element| element.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
