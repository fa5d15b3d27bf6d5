//! Document chunking.
//!
//! Provides the `Chunker` trait and a sliding-window implementation that
//! splits normalised text into overlapping fixed-length segments.
//!
//! Window `i` starts at `i * (max_chunk_chars - overlap_chars)` and spans up
//! to `max_chunk_chars` characters. Windows are trimmed and empty ones are
//! dropped. Splitting stops after the first window that reaches the end of
//! the text, so `"abcdefghij"` with size 4 and overlap 1 yields
//! `["abcd", "defg", "ghij"]`.

use thiserror::Error;

use super::config::ChunkingConfig;

/// Errors raised before any splitting happens.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("Invalid chunking configuration: {0}")]
    InvalidConfig(String),
}

/// A chunk before it is attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Char range of the untrimmed window in the normalised text (start, end).
    pub char_range: (usize, usize),

    /// The trimmed text content of this chunk.
    pub content: String,
}

impl RawChunk {
    pub fn new(char_range: (usize, usize), content: String) -> Self {
        Self {
            char_range,
            content,
        }
    }
}

/// Trait for document chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split document content into chunks.
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk>;
}

/// Fixed-size character windows with overlap.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlidingWindowChunker;

impl SlidingWindowChunker {
    pub fn new() -> Self {
        Self
    }
}

/// Trim outer whitespace and fold line breaks into single spaces.
pub fn normalize(text: &str) -> String {
    text.trim().replace("\r\n", " ").replace('\n', " ")
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk> {
        let normalized = normalize(content);
        if normalized.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = normalized.chars().collect();
        let step = config.step();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < chars.len() {
            let end = (start + config.max_chunk_chars).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();

            if !trimmed.is_empty() {
                chunks.push(RawChunk::new((start, end), trimmed.to_string()));
            }

            if end >= chars.len() {
                break;
            }
            start += step;
        }

        tracing::debug!(
            target: "chunker",
            "split {} chars into {} chunks (max {}, overlap {})",
            chars.len(),
            chunks.len(),
            config.max_chunk_chars,
            config.overlap_chars
        );

        chunks
    }
}

/// Split `text` into overlapping chunks of at most `max_chunk_chars` characters.
///
/// Rejects `max_chunk_chars == 0` and `overlap_chars >= max_chunk_chars`.
pub fn split_into_chunks(
    text: &str,
    max_chunk_chars: usize,
    overlap_chars: usize,
) -> Result<Vec<String>, ChunkingError> {
    let config = ChunkingConfig::new(max_chunk_chars, overlap_chars);
    config.validate().map_err(ChunkingError::InvalidConfig)?;

    Ok(SlidingWindowChunker::new()
        .chunk(text, &config)
        .into_iter()
        .map(|chunk| chunk.content)
        .collect())
}
