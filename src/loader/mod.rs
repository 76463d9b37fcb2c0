//! Corpus loaders producing page-level [`Document`]s tagged with their source.
//!
//! Every loader is a one-shot cursor: [`Loader::next_source`] reads one source
//! (one file, one page) per call and never revisits it.

pub mod pdf;
pub mod web;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

pub use web::WebPageLoader;

/// Kinds of sources the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// PDF file on disk, one document per page.
    Pdf,
    /// HTML page fetched over HTTP, one document per page.
    WebPage,
}

impl SourceKind {
    /// Label stored in document metadata under `kind`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::WebPage => "web",
        }
    }
}

/// File formats that can appear inside a corpus directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Portable Document Format.
    Pdf,
}

/// File extensions recognised inside a corpus directory. Anything else is skipped.
const FILE_EXTENSIONS: &[(&str, FileFormat)] = &[("pdf", FileFormat::Pdf)];

/// Resolves a path's extension through the dispatch table (case-insensitive).
pub fn format_for_path(path: &Path) -> Option<FileFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    FILE_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, format)| *format)
}

/// Where to read corpus documents from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Every recognised file below a directory.
    Directory(PathBuf),
    /// A single web page; `selector` picks the text-bearing elements.
    WebPage {
        /// Page URL.
        url: Url,
        /// CSS selector for the extracted elements.
        selector: String,
    },
}

/// One-shot cursor over a set of sources.
#[async_trait]
pub trait Loader: Send {
    /// Source kind this loader reads.
    fn kind(&self) -> SourceKind;

    /// Reads the next source, returning its documents, or `None` once exhausted.
    async fn next_source(&mut self) -> Result<Option<Vec<Document>>>;
}

/// Walks a corpus directory and dispatches each recognised file to its format reader.
pub struct DirectoryLoader {
    root: PathBuf,
    pending: VecDeque<(PathBuf, FileFormat)>,
}

impl DirectoryLoader {
    /// Lists the directory eagerly; files are read lazily by [`Loader::next_source`].
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(RagError::Config(format!(
                "corpus directory {} does not exist",
                root.display()
            )));
        }
        let mut pending = VecDeque::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|err| RagError::Ingest {
                source_id: root.display().to_string(),
                message: err.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match format_for_path(entry.path()) {
                Some(format) => pending.push_back((entry.into_path(), format)),
                None => debug!(path = %entry.path().display(), "skipping unrecognised file"),
            }
        }
        info!(root = %root.display(), files = pending.len(), "corpus directory scanned");
        Ok(Self { root, pending })
    }

    /// Files not read yet.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl Loader for DirectoryLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::Pdf
    }

    async fn next_source(&mut self) -> Result<Option<Vec<Document>>> {
        let Some((path, format)) = self.pending.pop_front() else {
            return Ok(None);
        };
        let docs = match format {
            FileFormat::Pdf => pdf::load_pdf(&self.root, &path).await?,
        };
        Ok(Some(docs))
    }
}

/// Opens the loader for a source specification.
pub fn open(spec: &SourceSpec, client: &reqwest::Client) -> Result<Box<dyn Loader>> {
    match spec {
        SourceSpec::Directory(root) => Ok(Box::new(DirectoryLoader::new(root.clone())?)),
        SourceSpec::WebPage { url, selector } => Ok(Box::new(WebPageLoader::new(
            client.clone(),
            url.clone(),
            selector,
        )?)),
    }
}

/// Drains every loader in order. Any unreadable source aborts the run.
pub async fn load_all(specs: &[SourceSpec], client: &reqwest::Client) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    for spec in specs {
        let mut loader = open(spec, client)?;
        while let Some(batch) = loader.next_source().await? {
            docs.extend(batch);
        }
    }
    info!(documents = docs.len(), "corpus loaded");
    Ok(docs)
}
