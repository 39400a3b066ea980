//! Language-model plumbing for the attest pipeline.
//!
//! [`attest_domain::traits::LlmProvider`] is the only thing the rest of the
//! workspace knows about a model. This crate supplies two providers for it
//! ([`OllamaProvider`] for a local server, [`MockProvider`] for tests) and
//! the adapters that turn a provider into the coordinator's collaborators:
//! [`LlmFactProposer`], [`LlmQuoteRecoverer`] and [`LlmDocumentSummarizer`].
//!
//! ```
//! use attest_llm::MockProvider;
//! use attest_domain::traits::LlmProvider;
//!
//! let mut provider = MockProvider::new("[]");
//! provider.add_response_containing("Lines 1-", r#"[{"claim": "x"}]"#);
//!
//! assert_eq!(provider.generate("Lines 1-40").unwrap(), r#"[{"claim": "x"}]"#);
//! assert_eq!(provider.generate("anything else").unwrap(), "[]");
//! assert_eq!(provider.call_count(), 2);
//! ```

#![warn(missing_docs)]

pub mod ollama;
mod parser;
mod prompt;
mod proposer;
mod recoverer;
mod summarizer;

use attest_domain::traits::LlmProvider as LlmProviderTrait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaProvider;
pub use parser::{parse_candidates, parse_recovery, parse_summary, RecoveryResponse};
pub use prompt::{ExtractionPrompt, RecoveryPrompt, SummaryPrompt, SUMMARY_INPUT_CHARS};
pub use proposer::LlmFactProposer;
pub use recoverer::LlmQuoteRecoverer;
pub use summarizer::LlmDocumentSummarizer;

/// Failure talking to, or understanding, a model
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport failure or a non-success HTTP status
    #[error("HTTP error: {0}")]
    Http(String),

    /// The model answered but the text is not what the prompt asked for
    #[error("Malformed model output: {0}")]
    Malformed(String),

    /// Server asked us to back off
    #[error("Rate limited by model server")]
    RateLimited,

    /// Server does not have the configured model pulled
    #[error("Model '{0}' not found on server")]
    ModelNotFound(String),

    /// Could not drive the request (runtime setup, scripted failure)
    #[error("Runtime error: {0}")]
    Runtime(String),
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail,
}

#[derive(Debug, Default)]
struct Script {
    exact: HashMap<String, Reply>,
    containing: Vec<(String, Reply)>,
}

impl Script {
    /// Exact prompt wins over substring rules; substring rules match in
    /// insertion order.
    fn lookup(&self, prompt: &str) -> Option<Reply> {
        self.exact.get(prompt).cloned().or_else(|| {
            self.containing
                .iter()
                .find(|(fragment, _)| prompt.contains(fragment.as_str()))
                .map(|(_, reply)| reply.clone())
        })
    }
}

/// Scripted provider for tests.
///
/// Clones share the script and the call counter, so a test can keep one
/// handle while the coordinator owns another.
#[derive(Debug, Clone)]
pub struct MockProvider {
    fallback: String,
    delay: Option<Duration>,
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Provider that answers every unscripted prompt with `fallback`
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            delay: None,
            script: Arc::new(Mutex::new(Script::default())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep this long before every answer (for timeout tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer `response` when the prompt is exactly `prompt`
    pub fn add_response(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.edit(|script| {
            script.exact.insert(prompt.into(), Reply::Text(response.into()));
        });
    }

    /// Answer `response` when the prompt contains `fragment`
    pub fn add_response_containing(&mut self, fragment: impl Into<String>, response: impl Into<String>) {
        self.edit(|script| script.containing.push((fragment.into(), Reply::Text(response.into()))));
    }

    /// Fail when the prompt is exactly `prompt`
    pub fn add_error(&mut self, prompt: impl Into<String>) {
        self.edit(|script| {
            script.exact.insert(prompt.into(), Reply::Fail);
        });
    }

    /// Fail when the prompt contains `fragment`
    pub fn add_error_containing(&mut self, fragment: impl Into<String>) {
        self.edit(|script| script.containing.push((fragment.into(), Reply::Fail)));
    }

    /// Prompts answered so far, across all clones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Zero the shared call counter
    pub fn reset_call_count(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn edit(&mut self, f: impl FnOnce(&mut Script)) {
        // A poisoned script only means another test thread panicked mid-edit
        let mut script = self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut script);
    }

    fn answer(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .lookup(prompt);

        match scripted {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail) => Err(LlmError::Runtime("scripted failure".to_string())),
            None => Ok(self.fallback.clone()),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("[]")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.answer(prompt)
    }

    fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        self.answer(prompt)
    }
}
