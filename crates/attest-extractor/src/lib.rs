//! Attest Extractor
//!
//! Chunk-validate-recover-resume pipeline for extracting source-verifiable
//! facts from long documents.
//!
//! # Overview
//!
//! A document is split into overlapping, line-numbered chunks. Each chunk is
//! handed to a `FactProposer`; every candidate fact it returns is checked
//! against the source text by the `Validator` before it is persisted in the
//! session store. Completed chunks are never processed twice, so an
//! interrupted run picks up where it stopped.
//!
//! # Architecture
//!
//! ```text
//! Document → Chunker → Coordinator ─┬→ FactProposer (per chunk, parallel)
//!                                    ├→ Validator → QuoteRecoverer (near misses)
//!                                    └→ SessionStore (per chunk)
//!          → merged facts → PostProcessor
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use attest_domain::{DocumentContext, SourceDocument};
//! use attest_extractor::{open_session, ExtractionCoordinator, ExtractorConfig};
//! use attest_llm::{LlmFactProposer, LlmQuoteRecoverer, MockProvider};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let document = Arc::new(SourceDocument::from_text("report.txt", "Backups run daily at 2 AM."));
//! let config = ExtractorConfig::default();
//! let store = open_session("sessions", "sess_demo", &document, &config)?;
//!
//! let coordinator = ExtractionCoordinator::new(
//!     LlmFactProposer::new(MockProvider::new("[]")),
//!     LlmQuoteRecoverer::new(MockProvider::new(r#"{"found": false}"#)),
//!     store,
//!     config,
//! )?;
//!
//! let report = coordinator.run(document, DocumentContext::new("report.txt")).await?;
//! println!("{}", report.stats.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod consolidate;
mod coordinator;
mod error;
mod postprocess;
mod session;


pub use chunking::Chunker;
pub use config::ExtractorConfig;
pub use consolidate::consolidate;
pub use coordinator::{ExtractionCoordinator, RunReport};
pub use error::ExtractorError;
pub use postprocess::{coverage, has_quantitative_values, PostProcessConfig, PostProcessor, ScoringWeights};
pub use session::open_session;
