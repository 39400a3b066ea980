//! Quote and fact validation against the source document

use crate::config::{ScoreBand, ValidationConfig};
use crate::matching::{best_fuzzy, find_exact, tokens_in, words};
use crate::GatekeeperError;
use attest_domain::traits::QuoteRecoverer;
use attest_domain::{
    CandidateFact, EvidenceQuote, Fact, LineRange, ProviderError, RecoveredQuote, SourceDocument,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

/// Outcome of validating a single evidence quote
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// Quote found (exactly or above the fuzzy threshold)
    Accepted(LineRange),

    /// Near miss corrected by the quote recoverer
    Recovered {
        /// Corrected quote text
        quote: String,

        /// Where the corrected quote was found
        location: LineRange,
    },

    /// Quote could not be verified
    Rejected(RejectionReason),
}

/// Reasons for rejection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectionReason {
    /// Best similarity was below the recovery band
    NotFound {
        /// Best similarity seen
        best_score: f64,
    },

    /// Quote was a near miss but recovery did not produce a verifiable quote
    RecoveryFailed {
        /// Best similarity of the original quote
        best_score: f64,
    },

    /// Candidate carried no evidence quotes
    NoEvidence,
}

/// Outcome of validating a whole candidate fact
#[derive(Debug, Clone, PartialEq)]
pub enum FactVerdict {
    /// Every quote matched the source
    Accepted(Fact),

    /// Every quote matched, at least one after recovery
    Recovered(Fact),

    /// At least one quote failed; the whole fact is dropped
    Rejected {
        /// Why the failing quote was rejected
        reason: RejectionReason,

        /// Index of the failing quote, `None` for `NoEvidence`
        quote_index: Option<usize>,
    },
}

impl FactVerdict {
    /// The accepted fact, if any
    pub fn into_fact(self) -> Option<Fact> {
        match self {
            FactVerdict::Accepted(fact) | FactVerdict::Recovered(fact) => Some(fact),
            FactVerdict::Rejected { .. } => None,
        }
    }
}

/// Local (no recoverer) classification of a quote
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuoteMatch {
    /// Exact or fuzzy match at or above `high_threshold`
    Found {
        /// Matched lines
        location: LineRange,

        /// 1.0 for exact matches
        score: f64,
    },

    /// Best score in the recovery band
    NearMiss {
        /// Best similarity seen
        best_score: f64,
    },

    /// Best score below `recovery_low`
    Missing {
        /// Best similarity seen
        best_score: f64,
    },
}

/// Validates evidence quotes against a source document
///
/// Matching is local and synchronous. Only near misses reach the quote
/// recoverer, which runs on the blocking pool under a timeout.
pub struct Validator<R> {
    config: ValidationConfig,
    recoverer: Arc<R>,
}

impl<R> Validator<R>
where
    R: QuoteRecoverer + 'static,
{
    /// Create a new Validator
    pub fn new(config: ValidationConfig, recoverer: R) -> Result<Self, GatekeeperError> {
        Self::with_shared(config, Arc::new(recoverer))
    }

    /// Create a Validator around a shared recoverer
    pub fn with_shared(config: ValidationConfig, recoverer: Arc<R>) -> Result<Self, GatekeeperError> {
        config.validate().map_err(GatekeeperError::Config)?;
        Ok(Self { config, recoverer })
    }

    /// Active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Classify a quote without calling the recoverer
    ///
    /// Tries an exact match inside the claimed range, then inside the range
    /// expanded by `expansion_lines`, then the best fuzzy window of the
    /// expanded range.
    pub fn locate(&self, quote: &EvidenceQuote, source: &SourceDocument) -> QuoteMatch {
        let max_line = source.line_count();
        let needle = words(&quote.quote);
        if max_line == 0 || needle.is_empty() {
            return QuoteMatch::Missing { best_score: 0.0 };
        }

        let claimed = quote.source_location.clamp_to(max_line);
        let expanded = claimed.expand(self.config.expansion_lines, max_line);
        let haystack = tokens_in(source, expanded);

        let inside: Vec<_> = haystack
            .iter()
            .filter(|t| claimed.contains(t.line))
            .cloned()
            .collect();
        if let Some(location) = find_exact(&needle, &inside).or_else(|| find_exact(&needle, &haystack)) {
            return QuoteMatch::Found { location, score: 1.0 };
        }

        match best_fuzzy(&needle, &haystack) {
            None => QuoteMatch::Missing { best_score: 0.0 },
            Some(best) => match self.config.band(best.score) {
                ScoreBand::Accept => QuoteMatch::Found {
                    location: best.location,
                    score: best.score,
                },
                ScoreBand::Recover => QuoteMatch::NearMiss { best_score: best.score },
                ScoreBand::Reject => QuoteMatch::Missing { best_score: best.score },
            },
        }
    }

    /// Validate a single quote supporting `claim`
    ///
    /// Recoverer failures and timeouts are returned as errors, not as
    /// rejections.
    pub async fn validate(
        &self,
        claim: &str,
        quote: &EvidenceQuote,
        source: &SourceDocument,
    ) -> Result<ValidationResult, ProviderError> {
        match self.locate(quote, source) {
            QuoteMatch::Found { location, .. } => Ok(ValidationResult::Accepted(location)),
            QuoteMatch::NearMiss { best_score } => self.recover(claim, quote, best_score, source).await,
            QuoteMatch::Missing { best_score } => {
                Ok(ValidationResult::Rejected(RejectionReason::NotFound { best_score }))
            }
        }
    }

    /// Validate every quote of a candidate; all must pass
    ///
    /// Quotes are classified locally first, so a candidate with any quote
    /// below the recovery band is rejected without a single recoverer call.
    pub async fn validate_fact(
        &self,
        candidate: &CandidateFact,
        source: &SourceDocument,
    ) -> Result<FactVerdict, ProviderError> {
        if candidate.evidence_quotes.is_empty() {
            return Ok(FactVerdict::Rejected {
                reason: RejectionReason::NoEvidence,
                quote_index: None,
            });
        }

        let matches: Vec<QuoteMatch> = candidate
            .evidence_quotes
            .iter()
            .map(|q| self.locate(q, source))
            .collect();

        if let Some((idx, best_score)) = matches.iter().enumerate().find_map(|(i, m)| match m {
            QuoteMatch::Missing { best_score } => Some((i, *best_score)),
            _ => None,
        }) {
            debug!(
                "Rejecting '{}': quote {} not found (best score {:.2})",
                candidate.claim, idx, best_score
            );
            return Ok(FactVerdict::Rejected {
                reason: RejectionReason::NotFound { best_score },
                quote_index: Some(idx),
            });
        }

        let mut validated = Vec::with_capacity(matches.len());
        let mut recovered_notes = Vec::new();

        for (idx, (quote, found)) in candidate.evidence_quotes.iter().zip(&matches).enumerate() {
            let result = match found {
                QuoteMatch::Found { location, .. } => ValidationResult::Accepted(*location),
                QuoteMatch::NearMiss { best_score } => {
                    self.recover(&candidate.claim, quote, *best_score, source).await?
                }
                QuoteMatch::Missing { best_score } => {
                    ValidationResult::Rejected(RejectionReason::NotFound { best_score: *best_score })
                }
            };

            match result {
                ValidationResult::Accepted(location) => validated.push(EvidenceQuote {
                    quote: quote.quote.clone(),
                    source_location: location,
                    relevance: quote.relevance.clone(),
                }),
                ValidationResult::Recovered { quote: text, location } => {
                    recovered_notes.push(json!({
                        "original_quote": quote.quote,
                        "recovered_quote": text,
                        "source_location": location.to_string(),
                    }));
                    validated.push(EvidenceQuote {
                        quote: text,
                        source_location: location,
                        relevance: quote.relevance.clone(),
                    });
                }
                ValidationResult::Rejected(reason) => {
                    debug!("Rejecting '{}': quote {} {:?}", candidate.claim, idx, reason);
                    return Ok(FactVerdict::Rejected {
                        reason,
                        quote_index: Some(idx),
                    });
                }
            }
        }

        let source_location = match LineRange::covering(validated.iter().map(|q| &q.source_location)) {
            Some(range) => range,
            None => {
                return Ok(FactVerdict::Rejected {
                    reason: RejectionReason::NoEvidence,
                    quote_index: None,
                })
            }
        };

        let mut metadata = candidate.metadata.clone();
        let was_recovered = !recovered_notes.is_empty();
        if was_recovered {
            metadata.insert("recovered_quotes".to_string(), Value::Array(recovered_notes));
        }

        let fact = Fact {
            claim: candidate.claim.clone(),
            source_doc: source.name().to_string(),
            source_location,
            evidence_quotes: validated,
            confidence: candidate.confidence.clamp(0.0, 1.0),
            metadata,
        };

        Ok(if was_recovered {
            FactVerdict::Recovered(fact)
        } else {
            FactVerdict::Accepted(fact)
        })
    }

    /// Ask the recoverer for an exact quote and re-verify it within the window
    async fn recover(
        &self,
        claim: &str,
        quote: &EvidenceQuote,
        best_score: f64,
        source: &SourceDocument,
    ) -> Result<ValidationResult, ProviderError> {
        let failed = ValidationResult::Rejected(RejectionReason::RecoveryFailed { best_score });
        if !self.config.enable_recovery {
            return Ok(failed);
        }

        let max_line = source.line_count();
        let window = quote
            .source_location
            .clamp_to(max_line)
            .expand(self.config.recovery_window_lines, max_line);

        let recovered = match self.call_recoverer(claim, &quote.quote, source.slice(window), window).await? {
            Some(recovered) => recovered,
            None => {
                debug!("Recoverer found nothing for '{}'", quote.quote);
                return Ok(failed);
            }
        };

        if recovered.confidence < self.config.min_recovery_confidence {
            debug!(
                "Recovered quote confidence {:.2} below {:.2}",
                recovered.confidence, self.config.min_recovery_confidence
            );
            return Ok(failed);
        }

        let needle = words(&recovered.quote);
        let haystack = tokens_in(source, window);
        let location = find_exact(&needle, &haystack).or_else(|| {
            best_fuzzy(&needle, &haystack)
                .filter(|m| m.score >= self.config.high_threshold)
                .map(|m| m.location)
        });

        Ok(match location {
            Some(location) => ValidationResult::Recovered {
                quote: recovered.quote,
                location,
            },
            None => {
                debug!("Recovered quote '{}' not present in window {}", recovered.quote, window);
                failed
            }
        })
    }

    async fn call_recoverer(
        &self,
        claim: &str,
        original: &str,
        window_text: String,
        window: LineRange,
    ) -> Result<Option<RecoveredQuote>, ProviderError> {
        let recoverer = Arc::clone(&self.recoverer);
        let claim = claim.to_string();
        let original = original.to_string();
        let limit = self.config.recovery_timeout();

        // Recoverers are blocking, so run them off the async workers
        timeout(
            limit,
            tokio::task::spawn_blocking(move || {
                recoverer.recover(&claim, &original, &window_text, window)
            }),
        )
        .await
        .map_err(|_| ProviderError::Timeout(limit))?
        .map_err(|e| ProviderError::Provider(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Recoverer returning a canned answer and counting calls
    struct FixedRecoverer {
        answer: Option<RecoveredQuote>,
        calls: AtomicUsize,
    }

    impl FixedRecoverer {
        fn returning(quote: &str, confidence: f64) -> Self {
            Self {
                answer: Some(RecoveredQuote {
                    quote: quote.to_string(),
                    source_location: LineRange::single(1),
                    confidence,
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn nothing() -> Self {
            Self {
                answer: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl QuoteRecoverer for FixedRecoverer {
        fn recover(
            &self,
            _claim: &str,
            _original_quote: &str,
            _window_text: &str,
            _window_range: LineRange,
        ) -> Result<Option<RecoveredQuote>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    struct SlowRecoverer;

    impl QuoteRecoverer for SlowRecoverer {
        fn recover(
            &self,
            _claim: &str,
            _original_quote: &str,
            _window_text: &str,
            _window_range: LineRange,
        ) -> Result<Option<RecoveredQuote>, ProviderError> {
            std::thread::sleep(Duration::from_millis(1500));
            Ok(None)
        }
    }

    fn backups_doc() -> SourceDocument {
        let mut lines = vec!["Backups run daily at 2 AM.".to_string()];
        lines.extend((2..=10).map(|i| format!("Control narrative line {}.", i)));
        SourceDocument::from_lines("soc2.txt", lines)
    }

    fn validator(recoverer: FixedRecoverer) -> (Validator<FixedRecoverer>, Arc<FixedRecoverer>) {
        let shared = Arc::new(recoverer);
        let v = Validator::with_shared(ValidationConfig::default(), Arc::clone(&shared)).unwrap();
        (v, shared)
    }

    fn quote(text: &str, start: usize, end: usize) -> EvidenceQuote {
        EvidenceQuote::new(text, LineRange::new(start, end))
    }

    #[tokio::test]
    async fn test_exact_quote_accepted_at_actual_line() {
        let (v, recoverer) = validator(FixedRecoverer::nothing());
        let result = v
            .validate("Backups are daily", &quote("Backups run daily at 2 AM.", 1, 10), &backups_doc())
            .await
            .unwrap();

        assert_eq!(result, ValidationResult::Accepted(LineRange::single(1)));
        assert_eq!(recoverer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exact_quote_near_claimed_range_gets_corrected_location() {
        let doc = SourceDocument::from_text("d", "a\nb\nc\nd\nMFA is enforced for all users\nf");
        let (v, _) = validator(FixedRecoverer::nothing());
        let result = v.validate("MFA", &quote("MFA is enforced", 1, 2), &doc).await.unwrap();

        assert_eq!(result, ValidationResult::Accepted(LineRange::single(5)));
    }

    #[tokio::test]
    async fn test_quote_outside_expansion_window_not_found() {
        let mut lines: Vec<String> = (1..=30).map(|i| format!("filler {}", i)).collect();
        lines[24] = "Encryption keys rotate annually".to_string();
        let doc = SourceDocument::from_lines("d", lines);
        let (v, recoverer) = validator(FixedRecoverer::nothing());

        let result = v
            .validate("keys", &quote("Encryption keys rotate annually", 1, 3), &doc)
            .await
            .unwrap();

        assert!(matches!(result, ValidationResult::Rejected(RejectionReason::NotFound { .. })));
        assert_eq!(recoverer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_paraphrase_recovered() {
        let (v, recoverer) = validator(FixedRecoverer::returning("Backups run daily at 2 AM.", 0.95));
        let result = v
            .validate("Backups are daily", &quote("Backup runs daily around 2AM", 1, 10), &backups_doc())
            .await
            .unwrap();

        assert_eq!(
            result,
            ValidationResult::Recovered {
                quote: "Backups run daily at 2 AM.".to_string(),
                location: LineRange::single(1),
            }
        );
        assert_eq!(recoverer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovery_returning_nothing_fails() {
        let (v, _) = validator(FixedRecoverer::nothing());
        let result = v
            .validate("c", &quote("Backup runs daily around 2AM", 1, 1), &backups_doc())
            .await
            .unwrap();
        assert!(matches!(result, ValidationResult::Rejected(RejectionReason::RecoveryFailed { .. })));
    }

    #[tokio::test]
    async fn test_recovery_below_confidence_floor_fails() {
        let (v, _) = validator(FixedRecoverer::returning("Backups run daily at 2 AM.", 0.5));
        let result = v
            .validate("c", &quote("Backup runs daily around 2AM", 1, 1), &backups_doc())
            .await
            .unwrap();
        assert!(matches!(result, ValidationResult::Rejected(RejectionReason::RecoveryFailed { .. })));
    }

    #[tokio::test]
    async fn test_recovered_quote_must_exist_in_window() {
        let (v, _) = validator(FixedRecoverer::returning("Backups are replicated offsite weekly", 0.99));
        let result = v
            .validate("c", &quote("Backup runs daily around 2AM", 1, 1), &backups_doc())
            .await
            .unwrap();
        assert!(matches!(result, ValidationResult::Rejected(RejectionReason::RecoveryFailed { .. })));
    }

    #[tokio::test]
    async fn test_recovery_disabled_never_calls_recoverer() {
        let recoverer = Arc::new(FixedRecoverer::returning("Backups run daily at 2 AM.", 1.0));
        let config = ValidationConfig {
            enable_recovery: false,
            ..Default::default()
        };
        let v = Validator::with_shared(config, Arc::clone(&recoverer)).unwrap();
        let result = v
            .validate("c", &quote("Backup runs daily around 2AM", 1, 1), &backups_doc())
            .await
            .unwrap();

        assert!(matches!(result, ValidationResult::Rejected(RejectionReason::RecoveryFailed { .. })));
        assert_eq!(recoverer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_score_exactly_at_thresholds() {
        let doc = backups_doc();
        let text = "Backup runs daily around 2AM";
        let score = similarity(text, "Backups run daily at 2 AM");

        // At high_threshold: accepted without recovery
        let at_high = ValidationConfig {
            high_threshold: score,
            recovery_low: 0.1,
            ..Default::default()
        };
        let recoverer = Arc::new(FixedRecoverer::nothing());
        let v = Validator::with_shared(at_high, Arc::clone(&recoverer)).unwrap();
        assert!(matches!(v.locate(&quote(text, 1, 1), &doc), QuoteMatch::Found { .. }));

        // At recovery_low: eligible for recovery
        let at_low = ValidationConfig {
            high_threshold: 0.99,
            recovery_low: score,
            ..Default::default()
        };
        let v = Validator::with_shared(at_low, Arc::clone(&recoverer)).unwrap();
        assert!(matches!(v.locate(&quote(text, 1, 1), &doc), QuoteMatch::NearMiss { .. }));
        v.validate("c", &quote(text, 1, 1), &doc).await.unwrap();
        assert_eq!(recoverer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovery_timeout_is_an_error() {
        let config = ValidationConfig {
            recovery_timeout_secs: 1,
            ..Default::default()
        };
        let v = Validator::new(config, SlowRecoverer).unwrap();
        let result = v
            .validate("c", &quote("Backup runs daily around 2AM", 1, 1), &backups_doc())
            .await;

        assert_eq!(result, Err(ProviderError::Timeout(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn test_fact_with_one_missing_quote_rejected_without_recovery() {
        let (v, recoverer) = validator(FixedRecoverer::returning("Backups run daily at 2 AM.", 1.0));
        let candidate = CandidateFact::new(
            "Backups are daily and keys rotate",
            vec![
                quote("Backup runs daily around 2AM", 1, 1),
                quote("Encryption keys rotate every 90 days", 1, 10),
            ],
            0.9,
        );

        let verdict = v.validate_fact(&candidate, &backups_doc()).await.unwrap();
        assert!(matches!(
            verdict,
            FactVerdict::Rejected { reason: RejectionReason::NotFound { .. }, quote_index: Some(1) }
        ));
        assert_eq!(recoverer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fact_with_recovered_quote() {
        let (v, _) = validator(FixedRecoverer::returning("Backups run daily at 2 AM.", 0.9));
        let candidate = CandidateFact::new(
            "Backups are daily",
            vec![
                quote("Control narrative line 4.", 4, 4),
                quote("Backup runs daily around 2AM", 1, 1),
            ],
            0.8,
        );

        let verdict = v.validate_fact(&candidate, &backups_doc()).await.unwrap();
        let fact = match verdict {
            FactVerdict::Recovered(fact) => fact,
            other => panic!("expected recovered fact, got {:?}", other),
        };

        assert_eq!(fact.source_location, LineRange::new(1, 4));
        assert_eq!(fact.evidence_quotes[1].quote, "Backups run daily at 2 AM.");
        assert_eq!(fact.source_doc, "soc2.txt");
        assert_eq!(fact.meta("recovered_quotes").and_then(|v| v.as_array()).map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_fact_without_quotes_rejected() {
        let (v, _) = validator(FixedRecoverer::nothing());
        let candidate = CandidateFact::new("Unsupported claim", vec![], 0.9);
        let verdict = v.validate_fact(&candidate, &backups_doc()).await.unwrap();

        assert_eq!(
            verdict,
            FactVerdict::Rejected {
                reason: RejectionReason::NoEvidence,
                quote_index: None
            }
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ValidationConfig {
            high_threshold: 0.3,
            recovery_low: 0.5,
            ..Default::default()
        };
        assert!(Validator::new(config, FixedRecoverer::nothing()).is_err());
    }
}
