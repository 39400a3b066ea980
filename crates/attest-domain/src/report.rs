//! Extraction statistics, per-chunk batches and consolidated output

use crate::fact::Fact;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Counters for a single chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStats {
    /// Candidates returned by the proposer
    pub extracted: usize,

    /// Candidates accepted without recovery
    pub validated: usize,

    /// Candidates accepted after quote recovery
    pub recovered: usize,

    /// Candidates rejected
    pub rejected: usize,
}

impl ChunkStats {
    /// Accepted facts (validated plus recovered)
    pub fn accepted(&self) -> usize {
        self.validated + self.recovered
    }
}

impl AddAssign for ChunkStats {
    fn add_assign(&mut self, rhs: Self) {
        self.extracted += rhs.extracted;
        self.validated += rhs.validated;
        self.recovered += rhs.recovered;
        self.rejected += rhs.rejected;
    }
}

/// Aggregated statistics for a run or a whole session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Chunks in the document
    pub chunks_total: usize,

    /// Chunks processed by the proposer in this run
    pub chunks_processed: usize,

    /// Chunks served from persisted facts
    pub chunks_resumed: usize,

    /// Chunks that failed in this run
    pub chunks_failed: usize,

    /// Chunks outside the requested range
    pub chunks_skipped: usize,

    /// Candidate counters summed over chunks
    pub facts: ChunkStats,
}

impl RunStats {
    /// Create empty stats for a document with `chunks_total` chunks
    pub fn new(chunks_total: usize) -> Self {
        Self {
            chunks_total,
            ..Self::default()
        }
    }

    /// Record a chunk processed in this run
    pub fn record_processed(&mut self, stats: ChunkStats) {
        self.chunks_processed += 1;
        self.facts += stats;
    }

    /// Record a chunk served from the session store
    pub fn record_resumed(&mut self, stats: ChunkStats) {
        self.chunks_resumed += 1;
        self.facts += stats;
    }

    /// Record a failed chunk
    pub fn record_failure(&mut self) {
        self.chunks_failed += 1;
    }

    /// Record chunks left out of a ranged run
    pub fn record_skipped(&mut self, count: usize) {
        self.chunks_skipped += count;
    }

    /// Total accepted facts
    pub fn total_accepted(&self) -> usize {
        self.facts.accepted()
    }

    /// Share of proposed candidates that were accepted
    pub fn acceptance_rate(&self) -> f64 {
        if self.facts.extracted == 0 {
            0.0
        } else {
            self.total_accepted() as f64 / self.facts.extracted as f64
        }
    }

    /// Generate a summary report
    pub fn summary(&self) -> String {
        let lines = [
            "Extraction Summary".to_string(),
            "==================".to_string(),
            format!(
                "Chunks: {} total, {} processed, {} resumed, {} failed, {} skipped",
                self.chunks_total,
                self.chunks_processed,
                self.chunks_resumed,
                self.chunks_failed,
                self.chunks_skipped
            ),
            format!("Extracted: {}", self.facts.extracted),
            format!("Validated: {}", self.facts.validated),
            format!("Recovered: {}", self.facts.recovered),
            format!("Rejected:  {}", self.facts.rejected),
            format!("Acceptance rate: {:.1}%", self.acceptance_rate() * 100.0),
        ];
        lines.join("\n")
    }
}

/// Facts persisted for one completed chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkBatch {
    /// Chunk the facts came from
    pub chunk_id: usize,

    /// Counters recorded when the chunk was processed
    pub stats: ChunkStats,

    /// Accepted facts in proposal order
    pub facts: Vec<Fact>,
}

/// A chunk that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedChunk {
    /// Chunk id
    pub chunk_id: usize,

    /// Error message of the last attempt
    pub error: String,
}

/// Merged view of every persisted batch in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consolidation {
    /// Session the facts belong to
    pub session_id: String,

    /// Name of the source document
    pub source_doc: String,

    /// Fingerprint of the document and chunking parameters
    pub document_fingerprint: String,

    /// Total chunks in the document
    pub chunk_count: usize,

    /// Number of facts in `facts`
    pub total_facts: usize,

    /// Counters summed over all persisted batches
    pub stats: ChunkStats,

    /// Chunks whose last attempt failed
    pub failed_chunks: Vec<FailedChunk>,

    /// Chunks not yet done (failed ones included)
    pub pending_chunks: Vec<usize>,

    /// Facts ordered by chunk id, then proposal order
    pub facts: Vec<Fact>,
}
