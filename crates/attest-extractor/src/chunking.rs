//! Line-based chunking of source documents

use crate::ExtractorError;
use attest_domain::{Chunk, LineRange, SourceDocument};

/// Splits a document into overlapping, line-numbered chunks
///
/// Consecutive chunks satisfy `next.start_line == prev.end_line - overlap + 1`.
/// The final chunk is emitted even when shorter than `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker; requires `size > 0` and `overlap < size`
    pub fn new(size: usize, overlap: usize) -> Result<Self, ExtractorError> {
        if size == 0 {
            return Err(ExtractorError::Config("chunk size must be greater than 0".to_string()));
        }
        if overlap >= size {
            return Err(ExtractorError::Config(format!(
                "chunk overlap ({}) must be less than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    /// Lines per chunk
    pub fn size(&self) -> usize {
        self.size
    }

    /// Lines shared between neighbours
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Number of chunks a document of `line_count` lines produces
    pub fn chunk_count(&self, line_count: usize) -> usize {
        if line_count == 0 {
            return 0;
        }
        if line_count <= self.size {
            return 1;
        }
        let step = self.size - self.overlap;
        1 + (line_count - self.size).div_ceil(step)
    }

    /// Chunk line ranges without copying any text
    pub fn ranges(&self, line_count: usize) -> Vec<LineRange> {
        let mut ranges = Vec::with_capacity(self.chunk_count(line_count));
        if line_count == 0 {
            return ranges;
        }

        let mut start = 1;
        loop {
            let end = (start + self.size - 1).min(line_count);
            ranges.push(LineRange::new(start, end));
            if end == line_count {
                break;
            }
            start = end - self.overlap + 1;
        }
        ranges
    }

    /// Chunk the document
    pub fn chunk(&self, document: &SourceDocument) -> Vec<Chunk> {
        self.ranges(document.line_count())
            .into_iter()
            .enumerate()
            .map(|(id, range)| Chunk {
                id,
                start_line: range.start,
                end_line: range.end,
                overlap_with_prev: if id == 0 { 0 } else { self.overlap },
                text: document.slice(range),
            })
            .collect()
    }
}
