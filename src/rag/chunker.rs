//! Content chunking for RAG indexing.
//!
//! Splits document text into overlapping windows suitable for embedding.
//! Sizes are counted in characters, not bytes, so Korean text is measured the
//! same way as ASCII. Every chunk is an exact slice of the input: the first
//! `overlap` characters of chunk `n + 1` are the last `overlap` characters of
//! chunk `n`, and nothing is trimmed.

use super::models::{Chunk, Document};

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Default overlap characters between chunks.
pub const DEFAULT_OVERLAP: usize = 150;

/// Boundaries tried in order when choosing where a chunk ends.
const SEPARATORS: &[&str] = &["\n\n", "\n", " "];

/// Chunk a document into embedding-ready chunks.
pub fn chunk_document(document: &Document, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    sliding_window(&document.text, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(index, (content, start, end))| {
            Chunk::new(&document.id, index as u32, content, start, end)
        })
        .collect()
}

/// Chunk raw text into string chunks.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    sliding_window(text, chunk_size, overlap)
        .into_iter()
        .map(|(content, _, _)| content)
        .collect()
}

/// Split text into overlapping chunks using a sliding window approach.
/// Returns tuples of (chunk_text, start_offset, end_offset) in characters.
///
/// `overlap` is clamped below `max_chars`; callers validate it up front.
fn sliding_window(text: &str, max_chars: usize, overlap: usize) -> Vec<(String, usize, usize)> {
    let max_chars = max_chars.max(1);
    let overlap = overlap.min(max_chars - 1);

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total <= max_chars {
        return vec![(text.to_string(), 0, total)];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let window_end = (start + max_chars).min(total);

        let end = if window_end < total {
            find_break_point(&chars[start..window_end], overlap)
                .map(|offset| start + offset)
                .unwrap_or(window_end)
        } else {
            window_end
        };

        chunks.push((chars[start..end].iter().collect(), start, end));

        if end >= total {
            break;
        }

        // end - start > overlap always holds, so this moves forward
        start = end - overlap;
    }

    chunks
}

/// Find where to end a chunk inside `window`, preferring paragraph, then line,
/// then word boundaries. The returned offset sits just past the separator and
/// always lies beyond the overlap region so the window keeps advancing.
fn find_break_point(window: &[char], overlap: usize) -> Option<usize> {
    let min_end = (overlap + 1).max(window.len() / 3);

    for separator in SEPARATORS {
        let sep: Vec<char> = separator.chars().collect();
        if window.len() < sep.len() {
            continue;
        }

        let found = (0..=window.len() - sep.len())
            .rev()
            .find(|&i| window[i..i + sep.len()] == sep[..] && i + sep.len() >= min_end);

        if let Some(pos) = found {
            return Some(pos + sep.len());
        }
    }

    None
}
