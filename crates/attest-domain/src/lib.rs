//! Attest Domain Layer
//!
//! Core model for the chunk-validate-recover-resume pipeline. Every other
//! crate in the workspace depends on the types and trait boundaries defined
//! here.
//!
//! ## Key Concepts
//!
//! - **SourceDocument**: Immutable, 1-indexed sequence of lines
//! - **Chunk**: Overlapping line window; the unit of work and of resumability
//! - **Fact**: A claim backed by one or more verbatim evidence quotes
//! - **SessionState**: Per-chunk progress that survives process restarts
//!
//! ## Architecture
//!
//! - Pure data and small helpers only
//! - Collaborators (fact proposer, quote recoverer, session store) are traits
//! - Infrastructure implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod fact;
pub mod location;
pub mod report;
pub mod session;
pub mod traits;

// Re-exports for convenience
pub use document::{Chunk, DocumentContext, DocumentSummary, SourceDocument};
pub use fact::{CandidateFact, EvidenceQuote, Fact, RecoveredQuote};
pub use location::{LineRange, ParseRangeError};
pub use report::{ChunkBatch, ChunkStats, Consolidation, FailedChunk, RunStats};
pub use session::{ChunkStatus, SessionState};
pub use traits::ProviderError;
