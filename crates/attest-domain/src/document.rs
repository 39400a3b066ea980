//! Source documents and the chunks cut from them

use crate::location::LineRange;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An immutable, line-numbered source document
///
/// Lines are 1-indexed. Building the same text twice yields identical line
/// numbering, which is what makes sessions resumable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    name: String,
    lines: Vec<String>,
}

impl SourceDocument {
    /// Build a document from raw text
    ///
    /// Splits with `str::lines` semantics: a trailing newline does not add an
    /// empty final line and `\r\n` endings are accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use attest_domain::SourceDocument;
    ///
    /// let doc = SourceDocument::from_text("report.txt", "first\nsecond\n");
    /// assert_eq!(doc.line_count(), 2);
    /// assert_eq!(doc.line(2), Some("second"));
    /// ```
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self {
            name: name.into(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Build a document from pre-split lines
    pub fn from_lines(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    /// Document name, used as `source_doc` on facts
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of lines
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// True when the document has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get a single line by 1-indexed number
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(String::as_str)
    }

    /// Lines of a range as `(line_number, text)` pairs, clamped to the document
    pub fn numbered(&self, range: LineRange) -> impl Iterator<Item = (usize, &str)> {
        let end = range.end.min(self.lines.len());
        let start = range.start.max(1);
        (start..=end).filter_map(move |n| self.line(n).map(|l| (n, l)))
    }

    /// Text of a range joined with `\n`, clamped to the document
    pub fn slice(&self, range: LineRange) -> String {
        self.numbered(range)
            .map(|(_, l)| l)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Full range of the document, `None` when empty
    pub fn full_range(&self) -> Option<LineRange> {
        if self.lines.is_empty() {
            None
        } else {
            Some(LineRange::new(1, self.lines.len()))
        }
    }

    /// Fingerprint of the document content together with the chunking parameters
    ///
    /// Two runs with the same fingerprint produce identical chunk boundaries,
    /// so a session is only resumable when fingerprints match.
    pub fn fingerprint(&self, chunk_size: usize, overlap: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("chunk_size={};overlap={};", chunk_size, overlap).as_bytes());
        for line in &self.lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A contiguous, overlapping window of source lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based sequence index; the unit of resumability
    pub id: usize,

    /// First line (1-indexed)
    pub start_line: usize,

    /// Last line, inclusive
    pub end_line: usize,

    /// Number of leading lines shared with the previous chunk
    pub overlap_with_prev: usize,

    /// Text of the covered lines joined with `\n`
    pub text: String,
}

impl Chunk {
    /// Line range covered by this chunk
    pub fn range(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }
}

/// Document-level context handed to the fact proposer with every chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Name of the source document
    pub source_doc: String,

    /// Optional summary of the whole document
    pub summary: Option<String>,
}

impl DocumentContext {
    /// Context for a document without a summary
    pub fn new(source_doc: impl Into<String>) -> Self {
        Self {
            source_doc: source_doc.into(),
            summary: None,
        }
    }

    /// Attach a document summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Whole-document summary generated once per session and reused on resume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Name of the summarized document
    pub source_doc: String,

    /// Summary text handed to the proposer with every chunk
    pub summary: String,
}

impl DocumentSummary {
    /// Create a summary for `source_doc`
    pub fn new(source_doc: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            source_doc: source_doc.into(),
            summary: summary.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_numbering_is_one_indexed() {
        let doc = SourceDocument::from_text("d", "a\r\nb\nc");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line(0), None);
        assert_eq!(doc.line(1), Some("a"));
        assert_eq!(doc.line(3), Some("c"));
        assert_eq!(doc.line(4), None);
    }

    #[test]
    fn test_slice_clamps() {
        let doc = SourceDocument::from_text("d", "one\ntwo\nthree");
        assert_eq!(doc.slice(LineRange::new(2, 10)), "two\nthree");
        assert_eq!(doc.slice(LineRange::new(5, 10)), "");
    }

    #[test]
    fn test_fingerprint_depends_on_content_and_params() {
        let doc = SourceDocument::from_text("d", "one\ntwo");
        let other = SourceDocument::from_text("d", "one\ntwo!");

        assert_eq!(doc.fingerprint(10, 2), doc.fingerprint(10, 2));
        assert_ne!(doc.fingerprint(10, 2), doc.fingerprint(10, 3));
        assert_ne!(doc.fingerprint(10, 2), other.fingerprint(10, 2));
        assert_eq!(doc.fingerprint(10, 2).len(), 64);
    }

    #[test]
    fn test_empty_document() {
        let doc = SourceDocument::from_text("d", "");
        assert!(doc.is_empty());
        assert_eq!(doc.full_range(), None);
    }
}
