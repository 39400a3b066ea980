//! QuoteRecoverer backed by an LLM provider

use crate::parser::parse_recovery;
use crate::prompt::RecoveryPrompt;
use attest_domain::traits::{LlmProvider, QuoteRecoverer};
use attest_domain::{LineRange, ProviderError, RecoveredQuote};
use tracing::{debug, info};

const RECOVERY_SCHEMA: &str = r#"{"found": "bool", "quote": "string", "confidence": "number", "reasoning": "string"}"#;

/// Asks an LLM to find the exact wording of a near-miss quote
pub struct LlmQuoteRecoverer<L> {
    llm: L,
}

impl<L> LlmQuoteRecoverer<L> {
    /// Wrap a provider
    pub fn new(llm: L) -> Self {
        Self { llm }
    }

    /// Access the wrapped provider
    pub fn provider(&self) -> &L {
        &self.llm
    }
}

impl<L> QuoteRecoverer for LlmQuoteRecoverer<L>
where
    L: LlmProvider + Send + Sync,
    L::Error: std::fmt::Display,
{
    fn recover(
        &self,
        claim: &str,
        original_quote: &str,
        window_text: &str,
        window_range: LineRange,
    ) -> Result<Option<RecoveredQuote>, ProviderError> {
        let prompt = RecoveryPrompt::new(claim, original_quote, window_text, window_range).build();

        let response = self
            .llm
            .generate_structured(&prompt, RECOVERY_SCHEMA)
            .map_err(|e| ProviderError::Provider(e.to_string()))?;
        let parsed = parse_recovery(&response).map_err(|e| ProviderError::Provider(e.to_string()))?;

        match parsed.quote {
            Some(quote) if parsed.found && !quote.trim().is_empty() => {
                info!("Recovered quote with {:.0}% confidence", parsed.confidence * 100.0);
                Ok(Some(RecoveredQuote {
                    quote,
                    source_location: window_range,
                    confidence: parsed.confidence.clamp(0.0, 1.0),
                }))
            }
            _ => {
                debug!(
                    "Recovery found nothing: {}",
                    parsed.reasoning.as_deref().unwrap_or("no reason given")
                );
                Ok(None)
            }
        }
    }
}
