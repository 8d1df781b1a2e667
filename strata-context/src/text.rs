//! Fixed-size overlapping text chunking.
//!
//! This module splits raw document text into the segments that get embedded
//! and stored by the retrieval pipeline. Chunking is deterministic: the same
//! text and configuration always produce the same chunks, which is what makes
//! re-indexing reproducible and upserts idempotent downstream.
//!
//! Chunks are measured in *characters*, not bytes, so multi-byte UTF-8
//! content never gets split inside a code point. Every chunk carries its
//! character offsets and sequence index so downstream storage can attach
//! provenance metadata.
//!
//! # Example
//!
//! ```
//! use strata_context::text::{ChunkConfig, TextChunker};
//!
//! let chunker = TextChunker::new(ChunkConfig::new(1000, 200)).unwrap();
//! let text = "x".repeat(2500);
//! let chunks = chunker.chunk("warehouse/orders.sql", &text);
//!
//! assert_eq!(chunks.len(), 3);
//! assert_eq!((chunks[0].char_start, chunks[0].char_end), (0, 1000));
//! assert_eq!((chunks[1].char_start, chunks[1].char_end), (800, 1800));
//! assert_eq!((chunks[2].char_start, chunks[2].char_end), (1600, 2500));
//! ```

use serde::Serialize;
use thiserror::Error;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Error raised for unusable chunking parameters.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("invalid chunking configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl ChunkError {
    pub fn invalid_configuration<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Chunking parameters: target size `chunk_size` and overlap `overlap`,
/// both in characters. `overlap` must be strictly smaller than `chunk_size`
/// or chunking could not make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkConfig {
    /// Number of characters per chunk (the final chunk may be shorter).
    pub chunk_size: usize,
    /// Number of characters shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Check the invariants `chunk_size > 0` and `overlap < chunk_size`.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size == 0 {
            return Err(ChunkError::invalid_configuration(
                "chunk_size must be greater than zero",
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkError::invalid_configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A single chunk of a document, with character offsets into the original
/// text and its position in the chunk sequence.
#[derive(Debug, Clone, Serialize)]
pub struct TextChunk {
    /// Identifier of the originating document (its source path).
    pub source: String,
    /// 0-indexed position of this chunk within the document's chunks.
    pub sequence: usize,
    /// Character offset of the first character of this chunk.
    pub char_start: usize,
    /// Character offset one past the last character of this chunk.
    pub char_end: usize,
    /// The chunk's text.
    pub text: String,
}

/// Splits document text into overlapping fixed-size chunks.
///
/// Construction validates the configuration; a built chunker can never fail
/// at chunk time.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkConfig,
}

impl TextChunker {
    pub fn new(config: ChunkConfig) -> Result<Self, ChunkError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    /// Split `text` into chunks covering the whole document.
    ///
    /// Consecutive chunks overlap by exactly `overlap` characters; only the
    /// final chunk may be shorter than `chunk_size`. Empty input yields an
    /// empty vector.
    pub fn chunk(&self, source: &str, text: &str) -> Vec<TextChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every character boundary, with the text length
        // appended, so slicing by character counts stays on code points.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;
        let stride = self.config.chunk_size - self.config.overlap;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + self.config.chunk_size).min(char_len);
            chunks.push(TextChunk {
                source: source.to_string(),
                sequence: chunks.len(),
                char_start: start,
                char_end: end,
                text: text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == char_len {
                break;
            }
            start += stride;
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_chunk_size() {
        assert!(TextChunker::new(ChunkConfig::new(0, 0)).is_err());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        assert!(TextChunker::new(ChunkConfig::new(100, 100)).is_err());
        assert!(TextChunker::new(ChunkConfig::new(100, 150)).is_err());
        assert!(TextChunker::new(ChunkConfig::new(100, 99)).is_ok());
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(ChunkConfig::default()).unwrap();
        assert!(chunker.chunk("doc.txt", "").is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunker = TextChunker::new(ChunkConfig::new(1000, 200)).unwrap();
        let chunks = chunker.chunk("doc.txt", "a short document");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, 16);
        assert_eq!(chunks[0].text, "a short document");
        assert_eq!(chunks[0].sequence, 0);
    }

    #[test]
    fn reference_offsets_for_2500_chars() {
        let chunker = TextChunker::new(ChunkConfig::new(1000, 200)).unwrap();
        let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunker.chunk("doc.txt", &text);

        assert_eq!(chunks.len(), 3);
        let offsets: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.char_start, c.char_end))
            .collect();
        assert_eq!(offsets, vec![(0, 1000), (800, 1800), (1600, 2500)]);
    }

    #[test]
    fn consecutive_chunks_overlap_exactly() {
        let chunker = TextChunker::new(ChunkConfig::new(300, 60)).unwrap();
        let text: String = (0..2000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunker.chunk("doc.txt", &text);

        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(pair[0].text.chars().count() - 60).collect();
            let head: String = pair[1].text.chars().take(60).collect();
            assert_eq!(tail, head);
            assert_eq!(pair[0].char_end - pair[1].char_start, 60);
        }
    }

    #[test]
    fn chunks_reconstruct_original_text() {
        let config = ChunkConfig::new(250, 50);
        let chunker = TextChunker::new(config).unwrap();
        let text: String = (0..1234).map(|i| char::from(b'A' + (i % 26) as u8)).collect();
        let chunks = chunker.chunk("doc.txt", &text);

        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(&chunk.text);
            } else {
                rebuilt.extend(chunk.text.chars().skip(config.overlap));
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let chunker = TextChunker::new(ChunkConfig::new(4, 1)).unwrap();
        // Each snowman is 3 bytes but 1 character.
        let text = "☃☃☃☃☃☃";
        let chunks = chunker.chunk("doc.txt", text);

        assert_eq!(chunks[0].text, "☃☃☃☃");
        assert_eq!((chunks[0].char_start, chunks[0].char_end), (0, 4));
        assert_eq!((chunks[1].char_start, chunks[1].char_end), (3, 6));
        assert_eq!(chunks[1].text, "☃☃☃");
    }

    #[test]
    fn chunking_is_deterministic() {
        let chunker = TextChunker::new(ChunkConfig::new(100, 25)).unwrap();
        let text: String = (0..777).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let first = chunker.chunk("doc.txt", &text);
        let second = chunker.chunk("doc.txt", &text);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!((a.char_start, a.char_end), (b.char_start, b.char_end));
        }
    }
}
