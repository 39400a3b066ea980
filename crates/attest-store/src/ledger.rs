//! Chunk status transitions shared by both store implementations
//!
//! A transition is planned against the current state, persisted by the
//! caller, and only then committed, so the in-memory view never runs ahead of
//! what is durable.

use crate::StoreError;
use attest_domain::{ChunkStatus, SessionState};
use std::collections::HashSet;

/// A requested status change
#[derive(Debug, Clone)]
pub(crate) enum Transition {
    Claim,
    Done(usize),
    Failed(String),
}

/// Session state plus the set of chunks claimed by this process
#[derive(Debug)]
pub(crate) struct Ledger {
    state: SessionState,
    claimed: HashSet<usize>,
}

impl Ledger {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            claimed: HashSet::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn check(&self, chunk_id: usize) -> Result<(), StoreError> {
        if chunk_id < self.state.chunk_count {
            Ok(())
        } else {
            Err(StoreError::UnknownChunk {
                chunk_id,
                chunk_count: self.state.chunk_count,
            })
        }
    }

    /// Next state for `transition`, or `None` when nothing should change
    pub fn plan(
        &self,
        chunk_id: usize,
        transition: &Transition,
    ) -> Result<Option<SessionState>, StoreError> {
        self.check(chunk_id)?;
        let current = self.state.status(chunk_id);

        let status = match transition {
            Transition::Claim => {
                let done = current.map(ChunkStatus::is_done).unwrap_or(false);
                if done || self.claimed.contains(&chunk_id) {
                    return Ok(None);
                }
                ChunkStatus::InProgress
            }
            Transition::Done(fact_count) => ChunkStatus::Done {
                fact_count: *fact_count,
            },
            Transition::Failed(error) => ChunkStatus::Failed {
                error: error.clone(),
            },
        };

        if current == Some(&status) && !matches!(transition, Transition::Claim) {
            return Ok(None);
        }

        let mut next = self.state.clone();
        next.per_chunk_status.insert(chunk_id, status);
        next.touch();
        Ok(Some(next))
    }

    /// Adopt a persisted state and update claim ownership
    pub fn commit(&mut self, chunk_id: usize, transition: &Transition, next: SessionState) {
        self.state = next;
        match transition {
            Transition::Claim => {
                self.claimed.insert(chunk_id);
            }
            Transition::Done(_) | Transition::Failed(_) => {
                self.claimed.remove(&chunk_id);
            }
        }
    }

    /// Release a claim without a status change (idempotent repeat of done/failed)
    pub fn release(&mut self, chunk_id: usize) {
        self.claimed.remove(&chunk_id);
    }
}
