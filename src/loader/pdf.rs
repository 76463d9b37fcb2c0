//! PDF text extraction, one document per page.

use std::path::Path;

use crc32fast::Hasher as Crc32;
use tracing::{debug, warn};

use super::SourceKind;
use crate::document::{Document, Metadata};
use crate::error::{RagError, Result};

/// Reads one PDF and returns its non-blank pages.
///
/// `source` metadata is the path relative to `root` so provenance survives
/// moving the corpus directory.
pub async fn load_pdf(root: &Path, path: &Path) -> Result<Vec<Document>> {
    let source_id = source_id(root, path);
    let bytes = tokio::fs::read(path).await.map_err(|err| RagError::Ingest {
        source_id: source_id.clone(),
        message: err.to_string(),
    })?;

    let mut hasher = Crc32::new();
    hasher.update(&bytes);
    let checksum = hasher.finalize();

    let pages =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .await
            .map_err(|err| RagError::Ingest {
                source_id: source_id.clone(),
                message: format!("pdf extraction task failed: {err}"),
            })?
            .map_err(|err| RagError::Ingest {
                source_id: source_id.clone(),
                message: err.to_string(),
            })?;

    let total_pages = pages.len();
    let docs: Vec<Document> = pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(idx, page)| {
            let metadata = Metadata::new(source_id.clone())
                .with("kind", SourceKind::Pdf.label())
                .with("page", idx + 1)
                .with("total_pages", total_pages)
                .with("checksum", checksum);
            Document::new(page, metadata)
        })
        .collect();

    if docs.is_empty() {
        warn!(source = %source_id, "pdf produced no extractable text");
    } else {
        debug!(source = %source_id, pages = docs.len(), total_pages, "pdf loaded");
    }
    Ok(docs)
}

fn source_id(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return path.to_string_lossy().into_owned();
    };
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
