//! Client for a local Ollama server.
//!
//! Only the non-streaming `/api/generate` endpoint is used. A whole chunk
//! goes out as one prompt and the full completion comes back as one JSON
//! body, so a request can take minutes on a CPU-bound model.
//!
//! ```no_run
//! use attest_llm::OllamaProvider;
//!
//! # async fn demo() -> Result<(), attest_llm::LlmError> {
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3.1");
//! let text = provider.generate_json("Return [] and nothing else").await?;
//! # Ok(())
//! # }
//! ```
//!
//! The [`LlmProvider`](attest_domain::traits::LlmProvider) impl blocks the
//! calling thread, so callers inside a runtime must go through
//! `spawn_blocking`.

use crate::LlmError;
use attest_domain::traits::LlmProvider as LlmProviderTrait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Where `ollama serve` listens by default
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// HTTP timeout per request
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Attempts per prompt, including the first
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Talks to one model on one Ollama server
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    max_retries: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
}

/// Outcome of one HTTP round trip
enum Attempt {
    Done(String),
    Retry(LlmError),
    GiveUp(LlmError),
}

impl OllamaProvider {
    /// Provider for `model` at `endpoint`; a trailing slash is dropped
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: build_client(timeout),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout,
        }
    }

    /// Provider for `model` at [`DEFAULT_ENDPOINT`]
    pub fn default_endpoint(model: impl Into<String>) -> Self {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Attempts per prompt; at least one is always made
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Replace the HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = build_client(timeout);
        self
    }

    /// Model this provider asks
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Free-form completion for `prompt`.
    ///
    /// # Errors
    ///
    /// [`LlmError::ModelNotFound`] straight away when the server lacks the
    /// model. Otherwise the last transport or rate-limit error once every
    /// attempt is spent.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.request(prompt, None).await
    }

    /// Completion with the server's JSON mode switched on
    pub async fn generate_json(&self, prompt: &str) -> Result<String, LlmError> {
        self.request(prompt, Some("json")).await
    }

    async fn request(&self, prompt: &str, format: Option<&str>) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = GenerateBody {
            model: &self.model,
            prompt,
            stream: false,
            format,
        };

        let mut last = LlmError::Http("no attempt made".to_string());
        for attempt in 1..=self.max_retries {
            debug!(model = %self.model, attempt, prompt_chars = prompt.len(), "Sending prompt to Ollama");
            match self.send_once(&url, &body).await {
                Attempt::Done(text) => return Ok(text),
                Attempt::GiveUp(err) => return Err(err),
                Attempt::Retry(err) => last = err,
            }

            if attempt < self.max_retries {
                let backoff = Duration::from_secs(1 << (attempt - 1));
                warn!("Ollama attempt {} failed ({}), backing off {:?}", attempt, last, backoff);
                tokio::time::sleep(backoff).await;
            }
        }
        Err(last)
    }

    async fn send_once(&self, url: &str, body: &GenerateBody<'_>) -> Attempt {
        let response = match self.client.post(url).json(body).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(LlmError::Http(format!("request failed: {}", e))),
        };

        match response.status() {
            status if status.is_success() => match response.json::<GenerateReply>().await {
                Ok(reply) => Attempt::Done(reply.response),
                Err(e) => Attempt::GiveUp(LlmError::Malformed(format!("unreadable generate reply: {}", e))),
            },
            StatusCode::NOT_FOUND => Attempt::GiveUp(LlmError::ModelNotFound(self.model.clone())),
            StatusCode::TOO_MANY_REQUESTS => Attempt::Retry(LlmError::RateLimited),
            status => {
                let detail = response.text().await.unwrap_or_default();
                Attempt::Retry(LlmError::Http(format!("{} {}", status, detail.trim())))
            }
        }
    }

    /// Run `fut` to completion from a synchronous caller.
    ///
    /// On a blocking-pool thread the surrounding runtime's handle is used;
    /// with no runtime at all a throwaway current-thread one is built.
    fn block_on<F: Future>(&self, fut: F) -> Result<F::Output, LlmError> {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            return Ok(handle.block_on(fut));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LlmError::Runtime(format!("cannot start tokio runtime: {}", e)))?;
        Ok(runtime.block_on(fut))
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Using default HTTP client, configured one failed to build: {}", e);
            reqwest::Client::new()
        }
    }
}

impl LlmProviderTrait for OllamaProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.block_on(self.request(prompt, None))?
    }

    fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        self.block_on(self.request(prompt, Some("json")))?
    }
}
