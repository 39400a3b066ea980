//! DocumentSummarizer backed by an LLM provider

use crate::parser::parse_summary;
use crate::prompt::SummaryPrompt;
use attest_domain::traits::{DocumentSummarizer, LlmProvider};
use attest_domain::ProviderError;
use tracing::info;

/// Asks an LLM for a structural summary of the whole document
pub struct LlmDocumentSummarizer<L> {
    llm: L,
}

impl<L> LlmDocumentSummarizer<L> {
    /// Wrap a provider
    pub fn new(llm: L) -> Self {
        Self { llm }
    }

    /// Access the wrapped provider
    pub fn provider(&self) -> &L {
        &self.llm
    }
}

impl<L> DocumentSummarizer for LlmDocumentSummarizer<L>
where
    L: LlmProvider + Send + Sync,
    L::Error: std::fmt::Display,
{
    fn summarize(&self, document_text: &str, document_name: &str) -> Result<String, ProviderError> {
        info!("Summarizing '{}' ({} chars)", document_name, document_text.len());
        let prompt = SummaryPrompt::new(document_text, document_name).build();

        let response = self
            .llm
            .generate_structured(&prompt, "{}")
            .map_err(|e| ProviderError::Provider(e.to_string()))?;
        parse_summary(&response).map_err(|e| ProviderError::Provider(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    #[test]
    fn test_summary_is_compact_json() {
        let llm = MockProvider::new(r#"{"document_type": "SOC 2 Type II", "key_entities": ["Okta"]}"#);
        let summarizer = LlmDocumentSummarizer::new(llm);

        let summary = summarizer.summarize("Okta enforces MFA.", "report.txt").unwrap();
        assert!(summary.contains("\"document_type\": \"SOC 2 Type II\""));
        assert_eq!(summarizer.provider().call_count(), 1);
    }

    #[test]
    fn test_prose_answer_is_provider_error() {
        let summarizer = LlmDocumentSummarizer::new(MockProvider::new("This is a SOC 2 report."));
        let result = summarizer.summarize("x", "report.txt");
        assert!(matches!(result, Err(ProviderError::Provider(_))));
    }
}
