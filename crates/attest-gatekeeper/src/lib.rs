//! Attest Gatekeeper
//!
//! Verifies that every evidence quote of a candidate fact actually occurs in
//! the source document before the fact is accepted.
//!
//! The Gatekeeper provides:
//! - Case, punctuation and whitespace normalization ahead of any comparison
//! - Exact token-run matching inside the claimed range and a small expansion
//! - Fuzzy scoring (character-bigram Sørensen–Dice) for OCR noise
//! - Quote recovery for near misses through a [`QuoteRecoverer`]
//! - All-or-nothing composition for multi-quote facts
//!
//! # Examples
//!
//! ```no_run
//! use attest_gatekeeper::{ValidationConfig, Validator};
//! # use attest_domain::traits::QuoteRecoverer;
//! # fn example<R: QuoteRecoverer + 'static>(recoverer: R) {
//! let validator = Validator::new(ValidationConfig::default(), recoverer).unwrap();
//! // let verdict = validator.validate_fact(&candidate, &document).await?;
//! # }
//! ```
//!
//! [`QuoteRecoverer`]: attest_domain::traits::QuoteRecoverer

#![warn(missing_docs)]

mod config;
mod error;
mod matching;
mod validator;

pub use config::{ScoreBand, ValidationConfig};
pub use error::GatekeeperError;
pub use matching::{best_fuzzy, find_exact, normalize, similarity, tokens_in, words, FuzzyMatch, Token};
pub use validator::{FactVerdict, QuoteMatch, RejectionReason, ValidationResult, Validator};
