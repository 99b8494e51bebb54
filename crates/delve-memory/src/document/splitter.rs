use std::collections::VecDeque;

use super::types::{Chunk, Document};

/// Break points tried in order; the empty separator splits into single characters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Recursive character splitter.
///
/// Text is cut at the coarsest separator present, pieces still too long are cut again at the
/// next separator, and runs of small pieces are merged back up to `chunk_size` with
/// `chunk_overlap` characters of carry-over. Separators stay attached to the start of the
/// piece that follows them. Chunks are whitespace-trimmed and empty ones dropped.
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        if !text.is_empty() {
            self.split_recursive(text, &SEPARATORS, &mut out);
        }
        out
    }

    /// Split every document, numbering chunks `chunk_0`, `chunk_1`, ... across the whole batch.
    #[must_use]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .map(|text| (text, doc.metadata.source.clone()))
            })
            .enumerate()
            .map(|(i, (text, source_path))| Chunk {
                id: format!("chunk_{i}"),
                text,
                source_path,
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        let (separator, remaining) = pick_separator(text, separators);

        let mut small: Vec<&str> = Vec::new();
        for piece in split_keep_start(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                self.merge(&small, out);
                small.clear();
            }
            if remaining.is_empty() {
                push_trimmed(piece, out);
            } else {
                self.split_recursive(piece, remaining, out);
            }
        }
        if !small.is_empty() {
            self.merge(&small, out);
        }
    }

    fn merge(&self, pieces: &[&str], out: &mut Vec<String>) {
        let SplitterConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > chunk_size && !window.is_empty() {
                push_trimmed(&window.iter().copied().collect::<String>(), out);
                while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                }
            }
            window.push_back(piece);
            total += len;
        }
        if !window.is_empty() {
            push_trimmed(&window.iter().copied().collect::<String>(), out);
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(text: &str, out: &mut Vec<String>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_owned());
    }
}

/// First separator that occurs in `text`, plus the finer separators left to try after it.
fn pick_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (i, &sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Split before every occurrence of `separator`, dropping empty pieces.
fn split_keep_start<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
