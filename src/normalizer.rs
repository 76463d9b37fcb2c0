//! Canonicalization of raw extracted text before deduplication and chunking.
//!
//! The default pass only touches whitespace and punctuation spacing. Case
//! folding destroys proper nouns, so it is available only through
//! [`NormalizeOptions::lowercase`].

use crate::document::Document;

const PUNCTUATION: [char; 6] = ['.', ',', ';', ':', '!', '?'];

/// Opt-in knobs for [`normalize_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Lowercase the text before the whitespace passes.
    pub lowercase: bool,
}

/// Normalizes text with the default (case-preserving) options.
pub fn normalize(text: &str) -> String {
    normalize_with(text, NormalizeOptions::default())
}

/// Normalizes text:
///
/// * runs of spaces/tabs become one space
/// * whitespace hugging a newline is removed
/// * `.,;:!?` lose the space before them and get exactly one space after
/// * three or more newlines collapse to a blank line
/// * the result is trimmed
pub fn normalize_with(text: &str, options: NormalizeOptions) -> String {
    let folded;
    let text = if options.lowercase {
        folded = text.to_lowercase();
        folded.as_str()
    } else {
        text
    };

    let text = collapse_horizontal(text);
    let text = trim_around_newlines(&text);
    let text = space_punctuation(&text);
    let text = trim_around_newlines(&text);
    let text = cap_newline_runs(&text);
    text.trim().to_string()
}

/// Applies [`normalize_with`] to every document in place.
pub fn normalize_documents(docs: &mut [Document], options: NormalizeOptions) {
    for doc in docs.iter_mut() {
        doc.text = normalize_with(&doc.text, options);
    }
}

fn is_horizontal(ch: char) -> bool {
    ch.is_whitespace() && ch != '\n'
}

fn collapse_horizontal(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        // carriage returns are dropped so CRLF pages look like LF pages
        if ch == '\r' {
            continue;
        }
        if is_horizontal(ch) {
            if !last_space {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf
}

fn trim_around_newlines(input: &str) -> String {
    input
        .split('\n')
        .map(|line| line.trim_matches(' '))
        .collect::<Vec<_>>()
        .join("\n")
}

fn space_punctuation(input: &str) -> String {
    let mut buf = String::with_capacity(input.len() + input.len() / 8);
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if PUNCTUATION.contains(&ch) {
            if buf.ends_with(' ') {
                buf.pop();
            }
            buf.push(ch);
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            buf.push(' ');
        } else {
            buf.push(ch);
        }
    }
    buf
}

fn cap_newline_runs(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut run = 0usize;
    for ch in input.chars() {
        if ch == '\n' {
            run += 1;
            if run > 2 {
                continue;
            }
        } else {
            run = 0;
        }
        buf.push(ch);
    }
    buf
}
