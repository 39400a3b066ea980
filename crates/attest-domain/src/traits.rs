//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and its
//! collaborators. Implementations live in other crates (attest-llm,
//! attest-store) or in tests.

use crate::document::{DocumentContext, DocumentSummary};
use crate::fact::{CandidateFact, Fact, RecoveredQuote};
use crate::location::LineRange;
use crate::report::{ChunkBatch, ChunkStats};
use crate::session::SessionState;
use std::time::Duration;
use thiserror::Error;

/// The single error channel of the fact proposer and quote recoverer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The collaborator failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// The collaborator did not answer in time
    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),
}

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (attest-llm)
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate text completion
    fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Generate with structured output (if supported)
    fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error>;
}

/// Proposes candidate facts for one chunk
///
/// Calls are blocking; the coordinator runs them on the blocking pool under a
/// timeout.
pub trait FactProposer: Send + Sync {
    /// Propose candidate facts for `chunk_text`, which covers `chunk_range`
    fn propose(
        &self,
        chunk_text: &str,
        chunk_range: LineRange,
        context: &DocumentContext,
    ) -> Result<Vec<CandidateFact>, ProviderError>;
}

/// Produces a summary of the whole document before chunk extraction
///
/// Blocking, like the other collaborators. The summary is advisory context
/// for the proposer; it is never a source of evidence quotes.
pub trait DocumentSummarizer: Send + Sync {
    /// Summarize `document_text`, which belongs to `document_name`
    fn summarize(&self, document_text: &str, document_name: &str) -> Result<String, ProviderError>;
}

/// Finds an exact quote for a near-miss evidence quote
pub trait QuoteRecoverer: Send + Sync {
    /// Search `window_text` (covering `window_range`) for text supporting
    /// `claim` that corresponds to `original_quote`
    ///
    /// `Ok(None)` means the recoverer found nothing.
    fn recover(
        &self,
        claim: &str,
        original_quote: &str,
        window_text: &str,
        window_range: LineRange,
    ) -> Result<Option<RecoveredQuote>, ProviderError>;
}

/// Durable per-session progress and fact storage
///
/// Implemented by the infrastructure layer (attest-store). Methods take
/// `&self`: implementations synchronize internally so one store can be shared
/// by every worker of a run. Every mutating call is durable before it returns.
pub trait SessionStore: Send + Sync {
    /// Error type for store operations
    type Error: std::fmt::Display + Send + 'static;

    /// Snapshot of the session state
    fn state(&self) -> Result<SessionState, Self::Error>;

    /// Claim a chunk for the calling worker
    ///
    /// Returns `false` without changing anything when the chunk is already
    /// done or already claimed in this process.
    fn mark_in_progress(&self, chunk_id: usize) -> Result<bool, Self::Error>;

    /// Record a chunk as done with its accepted fact count
    fn mark_done(&self, chunk_id: usize, fact_count: usize) -> Result<(), Self::Error>;

    /// Record a chunk as failed
    fn mark_failed(&self, chunk_id: usize, error: &str) -> Result<(), Self::Error>;

    /// Every chunk id not yet done, ascending
    fn pending_chunks(&self) -> Result<Vec<usize>, Self::Error>;

    /// Persist the accepted facts of a chunk
    fn persist_facts(
        &self,
        chunk_id: usize,
        facts: &[Fact],
        stats: ChunkStats,
    ) -> Result<(), Self::Error>;

    /// Load the persisted batch of a chunk, if any
    fn load_batch(&self, chunk_id: usize) -> Result<Option<ChunkBatch>, Self::Error>;

    /// Persist the document summary of the session, replacing any earlier one
    fn save_summary(&self, summary: &DocumentSummary) -> Result<(), Self::Error>;

    /// Load the persisted document summary, if one was saved
    fn load_summary(&self) -> Result<Option<DocumentSummary>, Self::Error>;

    /// Load the persisted facts of a chunk (empty when none were persisted)
    fn load_facts(&self, chunk_id: usize) -> Result<Vec<Fact>, Self::Error> {
        Ok(self
            .load_batch(chunk_id)?
            .map(|batch| batch.facts)
            .unwrap_or_default())
    }
}
