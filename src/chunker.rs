//! Recursive boundary splitter producing overlapping character windows.
//!
//! Text is first cut into contiguous atoms no longer than `chunk_size`
//! characters, preferring paragraph, line, sentence and word boundaries before a
//! hard character cut. Atoms are then greedily packed into windows; after each
//! window is emitted, a suffix of at most `chunk_overlap` characters is carried
//! into the next one. Chunk text is always an exact slice of the parent
//! document, so consecutive windows either touch or overlap.

use std::collections::VecDeque;
use std::ops::Range;

use tracing::debug;

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Separators tried in order; the empty separator means "cut anywhere".
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Window sizing, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters of context repeated between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// Rejects zero-sized windows and overlaps that would never advance.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits every document, assigning chunk ids in ingestion order.
pub fn split_documents(docs: &[Document], config: &ChunkerConfig) -> Result<Vec<Chunk>> {
    config.validate()?;
    let mut chunks = Vec::new();
    for doc in docs {
        let before = chunks.len();
        for range in window_ranges(&doc.text, config) {
            chunks.push(Chunk {
                chunk_id: chunks.len(),
                text: doc.text[range.clone()].to_string(),
                metadata: doc.metadata.clone(),
                char_start: range.start,
                char_end: range.end,
            });
        }
        debug!(
            source = %doc.metadata.source,
            chunks = chunks.len() - before,
            "document split"
        );
    }
    Ok(chunks)
}

/// Byte ranges of the windows for one text. Whitespace-only windows are dropped.
fn window_ranges(text: &str, config: &ChunkerConfig) -> Vec<Range<usize>> {
    let size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(size - 1);

    let mut atoms = Vec::new();
    split_atoms(text, 0..text.len(), &SEPARATORS, size, &mut atoms);

    let mut windows = Vec::new();
    let mut window: VecDeque<Atom> = VecDeque::new();
    let mut total = 0usize;

    for atom in atoms {
        if !window.is_empty() && total + atom.chars > size {
            push_window(text, &window, &mut windows);
            while let Some(front) = window.front() {
                if total > overlap || total + atom.chars > size {
                    total -= front.chars;
                    window.pop_front();
                } else {
                    break;
                }
            }
        }
        total += atom.chars;
        window.push_back(atom);
    }
    push_window(text, &window, &mut windows);
    windows
}

fn push_window(text: &str, window: &VecDeque<Atom>, out: &mut Vec<Range<usize>>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };
    let range = first.range.start..last.range.end;
    if !text[range.clone()].trim().is_empty() {
        out.push(range);
    }
}

#[derive(Debug, Clone)]
struct Atom {
    range: Range<usize>,
    chars: usize,
}

/// Cuts `text[range]` into contiguous pieces of at most `size` characters.
/// Each separator stays attached to the piece on its left.
fn split_atoms(
    text: &str,
    range: Range<usize>,
    separators: &[&str],
    size: usize,
    out: &mut Vec<Atom>,
) {
    let segment = &text[range.clone()];
    let chars = segment.chars().count();
    if chars == 0 {
        return;
    }
    if chars <= size {
        out.push(Atom { range, chars });
        return;
    }
    match separators.split_first() {
        Some((sep, rest)) if !sep.is_empty() => {
            if !segment.contains(sep) {
                split_atoms(text, range, rest, size, out);
                return;
            }
            let mut offset = range.start;
            for piece in segment.split_inclusive(sep) {
                let end = offset + piece.len();
                split_atoms(text, offset..end, rest, size, out);
                offset = end;
            }
        }
        _ => hard_cut(segment, range.start, size, out),
    }
}

fn hard_cut(segment: &str, base: usize, size: usize, out: &mut Vec<Atom>) {
    let mut start = 0usize;
    let mut count = 0usize;
    for (idx, _) in segment.char_indices() {
        if count == size {
            out.push(Atom {
                range: base + start..base + idx,
                chars: count,
            });
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        out.push(Atom {
            range: base + start..base + segment.len(),
            chars: count,
        });
    }
}
