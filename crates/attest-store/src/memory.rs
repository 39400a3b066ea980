//! In-memory session store for session-less runs

use crate::ledger::{Ledger, Transition};
use crate::StoreError;
use attest_domain::traits::SessionStore;
use attest_domain::{ChunkBatch, ChunkStats, DocumentSummary, Fact, SessionState};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Inner {
    ledger: Ledger,
    batches: BTreeMap<usize, ChunkBatch>,
    summary: Option<DocumentSummary>,
}

/// Non-durable session store with the same claim semantics as
/// [`FsSessionStore`](crate::FsSessionStore)
#[derive(Debug)]
pub struct MemorySessionStore {
    inner: Mutex<Inner>,
}

impl MemorySessionStore {
    /// Create a fresh session with every chunk pending
    pub fn new(session_id: &str, fingerprint: &str, chunk_count: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ledger: Ledger::new(SessionState::new(session_id, fingerprint, chunk_count)),
                batches: BTreeMap::new(),
                summary: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn apply(&self, chunk_id: usize, transition: Transition) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        match inner.ledger.plan(chunk_id, &transition)? {
            Some(next) => {
                inner.ledger.commit(chunk_id, &transition, next);
                Ok(true)
            }
            None => {
                if !matches!(transition, Transition::Claim) {
                    inner.ledger.release(chunk_id);
                }
                Ok(false)
            }
        }
    }
}

impl SessionStore for MemorySessionStore {
    type Error = StoreError;

    fn state(&self) -> Result<SessionState, StoreError> {
        Ok(self.lock()?.ledger.state().clone())
    }

    fn mark_in_progress(&self, chunk_id: usize) -> Result<bool, StoreError> {
        self.apply(chunk_id, Transition::Claim)
    }

    fn mark_done(&self, chunk_id: usize, fact_count: usize) -> Result<(), StoreError> {
        self.apply(chunk_id, Transition::Done(fact_count)).map(|_| ())
    }

    fn mark_failed(&self, chunk_id: usize, error: &str) -> Result<(), StoreError> {
        self.apply(chunk_id, Transition::Failed(error.to_string()))
            .map(|_| ())
    }

    fn pending_chunks(&self) -> Result<Vec<usize>, StoreError> {
        Ok(self.lock()?.ledger.state().pending_chunks())
    }

    fn persist_facts(
        &self,
        chunk_id: usize,
        facts: &[Fact],
        stats: ChunkStats,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.ledger.check(chunk_id)?;
        inner.batches.insert(
            chunk_id,
            ChunkBatch {
                chunk_id,
                stats,
                facts: facts.to_vec(),
            },
        );
        Ok(())
    }

    fn load_batch(&self, chunk_id: usize) -> Result<Option<ChunkBatch>, StoreError> {
        let inner = self.lock()?;
        inner.ledger.check(chunk_id)?;
        Ok(inner.batches.get(&chunk_id).cloned())
    }

    fn save_summary(&self, summary: &DocumentSummary) -> Result<(), StoreError> {
        self.lock()?.summary = Some(summary.clone());
        Ok(())
    }

    fn load_summary(&self) -> Result<Option<DocumentSummary>, StoreError> {
        Ok(self.lock()?.summary.clone())
    }
}
