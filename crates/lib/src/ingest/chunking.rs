//! # Text Chunking
//!
//! Splits extracted text into overlapping, size-bounded chunks. Larger
//! structural boundaries are tried first (blank lines, then line breaks); any
//! segment that still exceeds the chunk size is cut by a character window that
//! steps by `chunk_size - overlap_size`, so consecutive window chunks share
//! exactly the configured overlap.

use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum ChunkingError {
    #[error("Text content is empty or only whitespace")]
    EmptyContent,
    #[error("Invalid chunking parameters: chunk_size={chunk_size}, overlap_size={overlap_size}")]
    InvalidParams {
        chunk_size: usize,
        overlap_size: usize,
    },
}

/// Chunk size and overlap, in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub overlap_size: usize,
}

impl ChunkingParams {
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.chunk_size == 0 || self.overlap_size >= self.chunk_size {
            return Err(ChunkingError::InvalidParams {
                chunk_size: self.chunk_size,
                overlap_size: self.overlap_size,
            });
        }
        Ok(())
    }
}

/// Splits text into chunks of at most `chunk_size` characters.
///
/// For boundary-free text of length `n > chunk_size` this yields exactly
/// `ceil((n - chunk_size) / (chunk_size - overlap_size)) + 1` chunks.
pub fn split_text(text: &str, params: &ChunkingParams) -> Result<Vec<String>, ChunkingError> {
    params.validate()?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChunkingError::EmptyContent);
    }

    let mut chunks = Vec::new();
    split_segment(trimmed, &["\n\n", "\n"], params, &mut chunks);
    Ok(chunks)
}

fn split_segment(
    segment: &str,
    separators: &[&str],
    params: &ChunkingParams,
    out: &mut Vec<String>,
) {
    if segment.chars().count() <= params.chunk_size {
        out.push(segment.to_string());
        return;
    }

    match separators.first() {
        Some(sep) => {
            for piece in segment.split(sep) {
                let piece = piece.trim();
                if piece.is_empty() {
                    continue;
                }
                split_segment(piece, &separators[1..], params, out);
            }
        }
        None => {
            warn!(
                "Segment exceeds chunk size with no structural boundary left ({} > {}). Splitting by character window.",
                segment.chars().count(),
                params.chunk_size
            );
            split_window(segment, params, out);
        }
    }
}

/// Cuts a long run of text into `chunk_size` windows stepping by
/// `chunk_size - overlap_size`.
fn split_window(text: &str, params: &ChunkingParams, out: &mut Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    let step = params.chunk_size - params.overlap_size;
    let mut start = 0;

    loop {
        let end = std::cmp::min(start + params.chunk_size, chars.len());
        out.push(chars[start..end].iter().collect());

        // The final window reaches the end of the text; stepping further
        // would only produce a tail fully contained in this chunk.
        if end == chars.len() {
            break;
        }
        start += step;
    }
}
