//! FactProposer backed by an LLM provider

use crate::parser::parse_candidates;
use crate::prompt::ExtractionPrompt;
use attest_domain::traits::{FactProposer, LlmProvider};
use attest_domain::{CandidateFact, DocumentContext, LineRange, ProviderError};
use tracing::debug;

/// Proposes candidate facts by prompting an LLM with the line-numbered chunk
pub struct LlmFactProposer<L> {
    llm: L,
}

impl<L> LlmFactProposer<L> {
    /// Wrap a provider
    pub fn new(llm: L) -> Self {
        Self { llm }
    }

    /// Access the wrapped provider
    pub fn provider(&self) -> &L {
        &self.llm
    }
}

impl<L> FactProposer for LlmFactProposer<L>
where
    L: LlmProvider + Send + Sync,
    L::Error: std::fmt::Display,
{
    fn propose(
        &self,
        chunk_text: &str,
        chunk_range: LineRange,
        context: &DocumentContext,
    ) -> Result<Vec<CandidateFact>, ProviderError> {
        let prompt = ExtractionPrompt::new(chunk_text, chunk_range, context).build();
        debug!("Extraction prompt for {}: {} chars", chunk_range, prompt.len());

        let response = self
            .llm
            .generate(&prompt)
            .map_err(|e| ProviderError::Provider(e.to_string()))?;
        debug!("LLM response for {}: {} chars", chunk_range, response.len());

        parse_candidates(&response, chunk_range).map_err(|e| ProviderError::Provider(e.to_string()))
    }
}
