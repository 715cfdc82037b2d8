//! Document chunking.
//!
//! [`RecursiveChunker`] splits text into overlapping chunks of at most
//! `chunk_size` characters. It prefers the coarsest boundary that exists in
//! the text, in this order:
//!
//! 1. paragraph break (`\n\n`)
//! 2. line break (`\n`)
//! 3. sentence terminator followed by a space (`. `, `! `, `? `)
//! 4. space
//! 5. any character boundary
//!
//! Separators stay attached to the end of the unit they close, so chunks are
//! exact substrings of the input. Consecutive chunks share exactly
//! `chunk_overlap` characters: each new chunk starts that many characters
//! before the end of the previous one.

use crate::error::{RagError, Result};

/// A strategy for splitting document text into chunk strings.
pub trait Chunker: Send + Sync {
    /// Split `text` into ordered chunks.
    ///
    /// Returns an empty `Vec` for empty text and at least one chunk otherwise.
    fn chunk(&self, text: &str) -> Result<Vec<String>>;
}

/// Byte range of one chunk inside the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Inclusive start byte offset.
    pub start: usize,
    /// Exclusive end byte offset.
    pub end: usize,
}

/// Greedy recursive splitter with character overlap.
///
/// # Example
///
/// ```rust
/// use pdfqa_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(20, 5);
/// let chunks = chunker.chunk("Alpha beta gamma. Delta epsilon zeta.").unwrap();
/// assert_eq!(chunks[0], "Alpha beta gamma. ");
/// ```
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
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of characters repeated at the start of the next chunk
    ///
    /// Parameters are validated when chunking, not here.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Split `text` and return the byte range of every chunk.
    ///
    /// Spans are ordered, start at `0`, end at `text.len()`, and each span
    /// starts at or before the end of the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Chunking`] if `chunk_size` is zero or
    /// `chunk_overlap` is not smaller than `chunk_size`.
    pub fn split_spans(&self, text: &str) -> Result<Vec<ChunkSpan>> {
        if self.chunk_size == 0 {
            return Err(RagError::Chunking("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Chunking(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if text.is_empty() {
            return Ok(Vec::new());
        }

        // Units leave room for the carried overlap so every chunk after the
        // first can start with the full overlap and still fit.
        let unit_limit = self.chunk_size - self.chunk_overlap;
        let mut units = Vec::new();
        split_units(text, 0, unit_limit, &Separator::CASCADE, &mut units);

        Ok(merge_units(text, &units, self.chunk_size, self.chunk_overlap))
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Result<Vec<String>> {
        let spans = self.split_spans(text)?;
        Ok(spans.into_iter().map(|span| text[span.start..span.end].to_string()).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Paragraph,
    Line,
    Sentence,
    Word,
    Character,
}

impl Separator {
    const CASCADE: [Separator; 5] = [
        Separator::Paragraph,
        Separator::Line,
        Separator::Sentence,
        Separator::Word,
        Separator::Character,
    ];

    /// Byte offsets just past every occurrence of this separator in `text`,
    /// collected in one left-to-right pass.
    fn split_ends(self, text: &str) -> Vec<usize> {
        match self {
            Separator::Paragraph => text.match_indices("\n\n").map(|(i, _)| i + 2).collect(),
            Separator::Line => text.match_indices('\n').map(|(i, _)| i + 1).collect(),
            // `.`, `!`, `?` and space are ASCII, so every hit sits on a char boundary.
            Separator::Sentence => text
                .as_bytes()
                .windows(2)
                .enumerate()
                .filter(|(_, pair)| matches!(pair, [b'.' | b'!' | b'?', b' ']))
                .map(|(i, _)| i + 2)
                .collect(),
            Separator::Word => text.match_indices(' ').map(|(i, _)| i + 1).collect(),
            Separator::Character => text.char_indices().skip(1).map(|(i, _)| i).collect(),
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Decompose `text` into contiguous units of at most `limit` characters,
/// using the coarsest separator present and recursing into finer separators
/// only for pieces that are still too long.
fn split_units(
    text: &str,
    offset: usize,
    limit: usize,
    separators: &[Separator],
    units: &mut Vec<ChunkSpan>,
) {
    if char_len(text) <= limit {
        units.push(ChunkSpan { start: offset, end: offset + text.len() });
        return;
    }

    let split = separators.iter().enumerate().find_map(|(i, separator)| {
        let ends = separator.split_ends(text);
        (!ends.is_empty()).then_some((i, ends))
    });
    let Some((position, ends)) = split else {
        // Indivisible: emitted whole.
        units.push(ChunkSpan { start: offset, end: offset + text.len() });
        return;
    };
    let finer = &separators[position + 1..];

    let mut start = 0;
    for end in ends.into_iter().chain(std::iter::once(text.len())) {
        if end <= start {
            continue;
        }
        let piece = &text[start..end];
        if char_len(piece) <= limit {
            units.push(ChunkSpan { start: offset + start, end: offset + end });
        } else {
            split_units(piece, offset + start, limit, finer, units);
        }
        start = end;
    }
}

/// Greedily pack units into chunks of at most `max_len` characters, starting
/// each new chunk `overlap` characters before the end of the previous one.
fn merge_units(text: &str, units: &[ChunkSpan], max_len: usize, overlap: usize) -> Vec<ChunkSpan> {
    let mut chunks = Vec::new();
    // (start byte, end byte, length in chars)
    let mut current: Option<(usize, usize, usize)> = None;

    for unit in units {
        let unit_len = char_len(&text[unit.start..unit.end]);
        current = Some(match current {
            None => (unit.start, unit.end, unit_len),
            Some((start, _, len)) if len + unit_len <= max_len => (start, unit.end, len + unit_len),
            Some((start, end, len)) => {
                chunks.push(ChunkSpan { start, end });
                let carried = overlap.min(len).min(max_len.saturating_sub(unit_len));
                let overlap_start = back_by_chars(text, end, carried);
                (overlap_start, unit.end, carried + unit_len)
            }
        });
    }

    if let Some((start, end, _)) = current {
        chunks.push(ChunkSpan { start, end });
    }
    chunks
}

/// Byte offset `n` characters before `end`.
fn back_by_chars(text: &str, end: usize, n: usize) -> usize {
    if n == 0 {
        return end;
    }
    text[..end].char_indices().rev().nth(n - 1).map_or(0, |(i, _)| i)
}
