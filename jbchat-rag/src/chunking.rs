//! Text chunking for fetched documentation.
//!
//! [`RecursiveChunker`] splits hierarchically: paragraphs, then sentences,
//! then words, and only falls back to raw character windows for a single
//! word longer than the chunk size. Lengths are counted in characters, so
//! multi-byte text is never cut inside a code point.

use crate::config::RagConfig;

/// A strategy for splitting text into retrievable passages.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks. Whitespace-only input yields no chunks.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Paragraph, sentence and word separators, coarsest first.
const SEPARATORS: [&str; 5] = ["\n\n", ". ", "! ", "? ", " "];

/// Splits text hierarchically: paragraphs → sentences → words.
///
/// Adjacent segments are merged while they fit in `chunk_size`; each new
/// chunk starts with up to `chunk_overlap` characters of trailing segments
/// from the previous one.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }
    let Some((separator, remaining)) = separators.split_first() else {
        return split_by_size(text, chunk_size, chunk_overlap);
    };

    let segments = split_keeping_separator(text, separator);
    if segments.len() < 2 {
        return split_and_merge(text, chunk_size, chunk_overlap, remaining);
    }

    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut window_len = 0;

    for segment in segments {
        let len = char_len(segment);
        if len > chunk_size {
            if !window.is_empty() {
                chunks.push(window.concat());
                window.clear();
                window_len = 0;
            }
            chunks.extend(split_and_merge(segment, chunk_size, chunk_overlap, remaining));
            continue;
        }
        if !window.is_empty() && window_len + len > chunk_size {
            chunks.push(window.concat());
            while !window.is_empty()
                && (window_len > chunk_overlap || window_len + len > chunk_size)
            {
                window_len -= char_len(window.remove(0));
            }
        }
        window.push(segment);
        window_len += len;
    }
    if !window.is_empty() {
        chunks.push(window.concat());
    }
    chunks
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Character windows with overlap, for text with no usable separator.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        split_and_merge(text, self.chunk_size, self.chunk_overlap, &SEPARATORS)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunker = RecursiveChunker::new(100, 10);
        assert_eq!(chunker.split("  JBrowse 2 documentation  "), vec!["JBrowse 2 documentation"]);
        assert!(chunker.split(" \n\n ").is_empty());
    }

    #[test]
    fn paragraphs_are_preferred_split_points() {
        let chunker = RecursiveChunker::new(30, 0);
        let chunks = chunker.split("First paragraph here.\n\nSecond paragraph here.");
        assert_eq!(chunks, vec!["First paragraph here.", "Second paragraph here."]);
    }

    #[test]
    fn chunks_respect_size_and_keep_every_word() {
        let text = "Tracks display data. Each track has an adapter! Views hold tracks? \
                    Sessions store views and their tracks for later.";
        let chunker = RecursiveChunker::new(25, 8);
        let chunks = chunker.split(text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 25));
        for word in text.split_whitespace() {
            assert!(chunks.iter().any(|c| c.contains(word)), "missing {word}");
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = RecursiveChunker::new(20, 8).split(text);
        let shared = chunks.windows(2).any(|pair| {
            pair[0].split_whitespace().last().is_some_and(|last| pair[1].starts_with(last))
        });
        assert!(shared, "{chunks:?}");
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "é".repeat(50);
        let chunks = RecursiveChunker::new(16, 4).split(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 16));
        assert_eq!(chunks[0].chars().count(), 16);
    }
}
