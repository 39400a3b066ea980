//! Concurrent, resumable chunk processing

use crate::chunking::Chunker;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use attest_domain::traits::{DocumentSummarizer, FactProposer, QuoteRecoverer, SessionStore};
use attest_domain::{
    CandidateFact, Chunk, ChunkStats, DocumentContext, DocumentSummary, FailedChunk, Fact, ProviderError,
    RunStats, SourceDocument,
};
use attest_gatekeeper::{FactVerdict, Validator};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeBounds;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Result of an extraction run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Accepted facts ordered by chunk id, then proposal order
    pub facts: Vec<Fact>,

    /// Run counters
    pub stats: RunStats,

    /// Chunks that failed in this run, ascending
    pub failed_chunks: Vec<FailedChunk>,
}

impl RunReport {
    /// True when no chunk failed
    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

/// Drives proposer, validator and session store over every chunk of a document
///
/// Chunks already done in the session are served from their persisted facts.
/// The rest run on at most `max_workers` concurrent tasks; each reports its
/// outcome over a channel and the collector reassembles them in chunk order.
///
/// With a summarizer attached, the document is summarized once per session.
/// The summary is saved in the store and reloaded by every later run.
pub struct ExtractionCoordinator<P, R, S> {
    proposer: Arc<P>,
    validator: Arc<Validator<R>>,
    store: Arc<S>,
    summarizer: Option<Arc<dyn DocumentSummarizer>>,
    chunker: Chunker,
    config: ExtractorConfig,
}

impl<P, R, S> ExtractionCoordinator<P, R, S>
where
    P: FactProposer + 'static,
    R: QuoteRecoverer + 'static,
    S: SessionStore + 'static,
{
    /// Create a new coordinator
    pub fn new(proposer: P, recoverer: R, store: S, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        Self::with_shared(Arc::new(proposer), Arc::new(recoverer), Arc::new(store), config)
    }

    /// Create a coordinator around shared collaborators
    pub fn with_shared(
        proposer: Arc<P>,
        recoverer: Arc<R>,
        store: Arc<S>,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let validator = Validator::with_shared(config.validation.clone(), recoverer)?;

        Ok(Self {
            proposer,
            validator: Arc::new(validator),
            store,
            summarizer: None,
            chunker,
            config,
        })
    }

    /// Summarize the document before the first chunk of a session
    pub fn with_summarizer(mut self, summarizer: impl DocumentSummarizer + 'static) -> Self {
        self.summarizer = Some(Arc::new(summarizer));
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Get the session store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Chunker built from the configuration
    pub fn chunker(&self) -> Chunker {
        self.chunker
    }

    /// Session fingerprint of `document` under this configuration
    pub fn fingerprint(&self, document: &SourceDocument) -> String {
        document.fingerprint(self.config.chunk_size, self.config.chunk_overlap)
    }

    /// Process every chunk of the document
    pub async fn run(
        &self,
        document: Arc<SourceDocument>,
        context: DocumentContext,
    ) -> Result<RunReport, ExtractorError> {
        self.run_range(document, context, ..).await
    }

    /// Process only the chunks whose ids fall in `chunk_ids`
    ///
    /// Chunks outside the range are counted as skipped and contribute no
    /// facts to the report.
    pub async fn run_range(
        &self,
        document: Arc<SourceDocument>,
        context: DocumentContext,
        chunk_ids: impl RangeBounds<usize>,
    ) -> Result<RunReport, ExtractorError> {
        let chunks = self.chunker.chunk(&document);
        self.check_session(&document, chunks.len())?;

        let pending: BTreeSet<usize> = self
            .store
            .pending_chunks()
            .map_err(store_error)?
            .into_iter()
            .collect();
        let (selected, skipped): (Vec<Chunk>, Vec<Chunk>) =
            chunks.into_iter().partition(|c| chunk_ids.contains(&c.id));
        let (to_run, done): (Vec<Chunk>, Vec<Chunk>) =
            selected.into_iter().partition(|c| pending.contains(&c.id));

        let context = self.resolve_summary(&document, context, !to_run.is_empty()).await?;

        let mut stats = RunStats::new(to_run.len() + done.len() + skipped.len());
        stats.record_skipped(skipped.len());

        info!(
            "Starting extraction of '{}': {} chunks, {} to process, {} already done",
            document.name(),
            stats.chunks_total,
            to_run.len(),
            done.len()
        );

        let mut results: BTreeMap<usize, Vec<Fact>> = BTreeMap::new();

        for chunk in &done {
            match self.store.load_batch(chunk.id).map_err(store_error)? {
                Some(batch) => {
                    debug!("Chunk {} resumed with {} facts", chunk.id, batch.facts.len());
                    stats.record_resumed(batch.stats);
                    results.insert(chunk.id, batch.facts);
                }
                None => {
                    warn!("Chunk {} is done but has no persisted facts", chunk.id);
                    stats.record_resumed(ChunkStats::default());
                    results.insert(chunk.id, Vec::new());
                }
            }
        }

        let worker = ChunkWorker {
            proposer: Arc::clone(&self.proposer),
            validator: Arc::clone(&self.validator),
            store: Arc::clone(&self.store),
            document,
            context: Arc::new(context),
            proposer_timeout: self.config.proposer_timeout(),
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, ChunkOutcome)>();
        let mut handles = Vec::with_capacity(to_run.len());

        for chunk in to_run {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| ExtractorError::Task(e.to_string()))?;
            let worker = worker.clone();
            let tx = tx.clone();
            let chunk_id = chunk.id;

            let handle = tokio::spawn(async move {
                let outcome = worker.process(chunk).await;
                drop(permit);
                // The collector outlives every sender
                let _ = tx.send((chunk_id, outcome));
            });
            handles.push((chunk_id, handle));
        }
        drop(tx);

        let mut failed_chunks = Vec::new();

        while let Some((chunk_id, outcome)) = rx.recv().await {
            match outcome {
                ChunkOutcome::Completed { facts, stats: chunk_stats } => {
                    stats.record_processed(chunk_stats);
                    results.insert(chunk_id, facts);
                }
                ChunkOutcome::Claimed => stats.record_skipped(1),
                ChunkOutcome::Failed(error) => {
                    stats.record_failure();
                    failed_chunks.push(FailedChunk { chunk_id, error });
                }
            }
        }

        for (chunk_id, handle) in handles {
            if let Err(e) = handle.await {
                error!("Worker for chunk {} did not finish: {}", chunk_id, e);
                let message = format!("Worker task failed: {}", e);
                // Releases the claim so a later run retries the chunk
                if let Err(store_err) = self.store.mark_failed(chunk_id, &message) {
                    error!("Chunk {}: could not record failure: {}", chunk_id, store_err);
                }
                stats.record_failure();
                failed_chunks.push(FailedChunk { chunk_id, error: message });
            }
        }

        failed_chunks.sort_by_key(|f| f.chunk_id);
        let facts: Vec<Fact> = results.into_values().flatten().collect();

        info!(
            "Extraction finished: {} facts from {} chunks ({} processed, {} resumed, {} failed)",
            facts.len(),
            stats.chunks_total,
            stats.chunks_processed,
            stats.chunks_resumed,
            stats.chunks_failed
        );

        Ok(RunReport {
            facts,
            stats,
            failed_chunks,
        })
    }

    /// Summary to hand the proposer: the caller's, else the session's, else a fresh one
    async fn resolve_summary(
        &self,
        document: &Arc<SourceDocument>,
        context: DocumentContext,
        needed: bool,
    ) -> Result<DocumentContext, ExtractorError> {
        if let Some(summary) = &context.summary {
            self.store
                .save_summary(&DocumentSummary::new(context.source_doc.clone(), summary.clone()))
                .map_err(store_error)?;
            return Ok(context);
        }

        if let Some(saved) = self.store.load_summary().map_err(store_error)? {
            info!("Using saved summary of '{}'", saved.source_doc);
            return Ok(context.with_summary(saved.summary));
        }

        let summarizer = match &self.summarizer {
            Some(summarizer) if needed => Arc::clone(summarizer),
            _ => return Ok(context),
        };

        info!("Generating summary of '{}'", document.name());
        let doc = Arc::clone(document);
        let name = context.source_doc.clone();
        let limit = self.config.proposer_timeout();
        let summary = timeout(
            limit,
            tokio::task::spawn_blocking(move || {
                let text = doc.full_range().map(|range| doc.slice(range)).unwrap_or_default();
                summarizer.summarize(&text, &name)
            }),
        )
        .await
        .map_err(|_| ProviderError::Timeout(limit))?
        .map_err(|e| ExtractorError::Task(e.to_string()))??;

        self.store
            .save_summary(&DocumentSummary::new(context.source_doc.clone(), summary.clone()))
            .map_err(store_error)?;
        Ok(context.with_summary(summary))
    }

    fn check_session(&self, document: &SourceDocument, chunk_count: usize) -> Result<(), ExtractorError> {
        let state = self.store.state().map_err(store_error)?;
        let fingerprint = self.fingerprint(document);

        if state.document_fingerprint != fingerprint || state.chunk_count != chunk_count {
            return Err(ExtractorError::SessionConflict(format!(
                "session '{}' was created for fingerprint {} with {} chunks, document has {} with {} chunks",
                state.session_id, state.document_fingerprint, state.chunk_count, fingerprint, chunk_count
            )));
        }
        Ok(())
    }
}

fn store_error<E: std::fmt::Display>(e: E) -> ExtractorError {
    ExtractorError::Store(e.to_string())
}

/// What a worker reports for its chunk
enum ChunkOutcome {
    Completed { facts: Vec<Fact>, stats: ChunkStats },

    /// Another worker holds the chunk
    Claimed,

    Failed(String),
}

/// Everything a spawned chunk task needs
struct ChunkWorker<P, R, S> {
    proposer: Arc<P>,
    validator: Arc<Validator<R>>,
    store: Arc<S>,
    document: Arc<SourceDocument>,
    context: Arc<DocumentContext>,
    proposer_timeout: Duration,
}

impl<P, R, S> Clone for ChunkWorker<P, R, S> {
    fn clone(&self) -> Self {
        Self {
            proposer: Arc::clone(&self.proposer),
            validator: Arc::clone(&self.validator),
            store: Arc::clone(&self.store),
            document: Arc::clone(&self.document),
            context: Arc::clone(&self.context),
            proposer_timeout: self.proposer_timeout,
        }
    }
}

impl<P, R, S> ChunkWorker<P, R, S>
where
    P: FactProposer + 'static,
    R: QuoteRecoverer + 'static,
    S: SessionStore + 'static,
{
    async fn process(&self, chunk: Chunk) -> ChunkOutcome {
        match self.store.mark_in_progress(chunk.id) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Chunk {} already claimed, skipping", chunk.id);
                return ChunkOutcome::Claimed;
            }
            Err(e) => return ChunkOutcome::Failed(format!("Store error: {}", e)),
        }

        debug!("Processing chunk {} ({})", chunk.id, chunk.range());

        match self.extract(&chunk).await {
            Ok((facts, stats)) => self.commit(chunk.id, facts, stats),
            Err(e) => {
                warn!("Chunk {} failed: {}", chunk.id, e);
                self.fail(chunk.id, e.to_string())
            }
        }
    }

    async fn extract(&self, chunk: &Chunk) -> Result<(Vec<Fact>, ChunkStats), ProviderError> {
        let candidates = self.propose(chunk).await?;
        debug!("Chunk {}: {} candidates", chunk.id, candidates.len());

        let mut stats = ChunkStats {
            extracted: candidates.len(),
            ..ChunkStats::default()
        };
        let mut facts = Vec::with_capacity(candidates.len());

        for candidate in &candidates {
            match self.validator.validate_fact(candidate, &self.document).await? {
                FactVerdict::Accepted(fact) => {
                    stats.validated += 1;
                    facts.push(fact);
                }
                FactVerdict::Recovered(fact) => {
                    stats.recovered += 1;
                    facts.push(fact);
                }
                FactVerdict::Rejected { reason, quote_index } => {
                    stats.rejected += 1;
                    debug!(
                        "Chunk {}: rejected '{}' (quote {:?}): {:?}",
                        chunk.id, candidate.claim, quote_index, reason
                    );
                }
            }
        }

        Ok((facts, stats))
    }

    /// Call the proposer on the blocking pool under the proposer timeout
    async fn propose(&self, chunk: &Chunk) -> Result<Vec<CandidateFact>, ProviderError> {
        let proposer = Arc::clone(&self.proposer);
        let context = Arc::clone(&self.context);
        let text = chunk.text.clone();
        let range = chunk.range();
        let limit = self.proposer_timeout;

        timeout(
            limit,
            tokio::task::spawn_blocking(move || proposer.propose(&text, range, &context)),
        )
        .await
        .map_err(|_| ProviderError::Timeout(limit))?
        .map_err(|e| ProviderError::Provider(format!("Task join error: {}", e)))?
    }

    fn commit(&self, chunk_id: usize, facts: Vec<Fact>, stats: ChunkStats) -> ChunkOutcome {
        if let Err(e) = self.store.persist_facts(chunk_id, &facts, stats) {
            error!("Chunk {}: failed to persist facts: {}", chunk_id, e);
            return self.fail(chunk_id, format!("Persistence error: {}", e));
        }
        if let Err(e) = self.store.mark_done(chunk_id, facts.len()) {
            error!("Chunk {}: failed to mark done: {}", chunk_id, e);
            return self.fail(chunk_id, format!("Persistence error: {}", e));
        }

        info!(
            "Chunk {} complete: {} extracted, {} validated, {} recovered, {} rejected",
            chunk_id, stats.extracted, stats.validated, stats.recovered, stats.rejected
        );
        ChunkOutcome::Completed { facts, stats }
    }

    fn fail(&self, chunk_id: usize, error: String) -> ChunkOutcome {
        if let Err(e) = self.store.mark_failed(chunk_id, &error) {
            error!("Chunk {}: could not record failure: {}", chunk_id, e);
        }
        ChunkOutcome::Failed(error)
    }
}
