//! Directory-backed session store

use crate::ledger::{Ledger, Transition};
use crate::StoreError;
use attest_domain::traits::SessionStore;
use attest_domain::{ChunkBatch, ChunkStats, Consolidation, DocumentSummary, Fact, SessionState};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const SESSION_FILE: &str = "session.json";
const FACTS_DIR: &str = "facts";
const CONSOLIDATED_FILE: &str = "consolidated_facts.json";
const SUMMARY_FILE: &str = "summary.json";

/// Session store backed by one directory per session
///
/// Every mutating call rewrites the affected file atomically before it
/// returns. In-memory state is updated only after the write succeeded.
#[derive(Debug)]
pub struct FsSessionStore {
    dir: PathBuf,
    ledger: Mutex<Ledger>,
}

impl FsSessionStore {
    /// Load the session `session_id` under `base_dir`, or create it
    ///
    /// A session found on disk is only reused when its fingerprint matches;
    /// otherwise `StoreError::SessionConflict` is returned and nothing on disk
    /// is touched.
    pub fn create_or_load(
        base_dir: impl AsRef<Path>,
        session_id: &str,
        fingerprint: &str,
        chunk_count: usize,
    ) -> Result<Self, StoreError> {
        let dir = base_dir.as_ref().join(session_id);
        let session_path = dir.join(SESSION_FILE);

        let state = match read_json::<SessionState>(&session_path)? {
            Some(state) => {
                if state.document_fingerprint != fingerprint || state.chunk_count != chunk_count {
                    return Err(StoreError::SessionConflict {
                        session_id: session_id.to_string(),
                        stored: state.document_fingerprint,
                        requested: fingerprint.to_string(),
                    });
                }
                info!(
                    "Resuming session {}: {}/{} chunks done",
                    session_id,
                    state.done_count(),
                    state.chunk_count
                );
                state
            }
            None => {
                let state = SessionState::new(session_id, fingerprint, chunk_count);
                write_json_atomic(&session_path, &state)?;
                info!("Created session {} with {} chunks", session_id, chunk_count);
                state
            }
        };

        fs::create_dir_all(dir.join(FACTS_DIR))?;

        Ok(Self {
            dir,
            ledger: Mutex::new(Ledger::new(state)),
        })
    }

    /// Open an existing session without checking its fingerprint
    pub fn open(base_dir: impl AsRef<Path>, session_id: &str) -> Result<Self, StoreError> {
        let dir = base_dir.as_ref().join(session_id);
        let state = read_json::<SessionState>(&dir.join(SESSION_FILE))?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;

        Ok(Self {
            dir,
            ledger: Mutex::new(Ledger::new(state)),
        })
    }

    /// Directory holding the session files
    pub fn session_dir(&self) -> &Path {
        &self.dir
    }

    /// Failed chunks with their last error, ascending
    pub fn failed_chunks(&self) -> Result<Vec<(usize, String)>, StoreError> {
        Ok(self.lock()?.state().failed_chunks())
    }

    /// Write the consolidated fact document into the session directory
    pub fn write_consolidation(&self, consolidation: &Consolidation) -> Result<PathBuf, StoreError> {
        let path = self.dir.join(CONSOLIDATED_FILE);
        write_json_atomic(&path, consolidation)?;
        info!(
            "Wrote {} consolidated facts to {}",
            consolidation.total_facts,
            path.display()
        );
        Ok(path)
    }

    fn batch_path(&self, chunk_id: usize) -> PathBuf {
        self.dir
            .join(FACTS_DIR)
            .join(format!("chunk_{:04}.json", chunk_id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>, StoreError> {
        self.ledger
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn apply(&self, chunk_id: usize, transition: Transition) -> Result<bool, StoreError> {
        let mut ledger = self.lock()?;
        match ledger.plan(chunk_id, &transition)? {
            Some(next) => {
                write_json_atomic(&self.dir.join(SESSION_FILE), &next)?;
                ledger.commit(chunk_id, &transition, next);
                Ok(true)
            }
            None => {
                if !matches!(transition, Transition::Claim) {
                    ledger.release(chunk_id);
                }
                Ok(false)
            }
        }
    }
}

impl SessionStore for FsSessionStore {
    type Error = StoreError;

    fn state(&self) -> Result<SessionState, StoreError> {
        Ok(self.lock()?.state().clone())
    }

    fn mark_in_progress(&self, chunk_id: usize) -> Result<bool, StoreError> {
        let claimed = self.apply(chunk_id, Transition::Claim)?;
        if !claimed {
            debug!("Chunk {} not claimable", chunk_id);
        }
        Ok(claimed)
    }

    fn mark_done(&self, chunk_id: usize, fact_count: usize) -> Result<(), StoreError> {
        self.apply(chunk_id, Transition::Done(fact_count))?;
        Ok(())
    }

    fn mark_failed(&self, chunk_id: usize, error: &str) -> Result<(), StoreError> {
        self.apply(chunk_id, Transition::Failed(error.to_string()))?;
        Ok(())
    }

    fn pending_chunks(&self) -> Result<Vec<usize>, StoreError> {
        Ok(self.lock()?.state().pending_chunks())
    }

    fn persist_facts(
        &self,
        chunk_id: usize,
        facts: &[Fact],
        stats: ChunkStats,
    ) -> Result<(), StoreError> {
        self.lock()?.check(chunk_id)?;
        let batch = ChunkBatch {
            chunk_id,
            stats,
            facts: facts.to_vec(),
        };
        write_json_atomic(&self.batch_path(chunk_id), &batch)?;
        debug!("Persisted {} facts for chunk {}", facts.len(), chunk_id);
        Ok(())
    }

    fn load_batch(&self, chunk_id: usize) -> Result<Option<ChunkBatch>, StoreError> {
        self.lock()?.check(chunk_id)?;
        read_json(&self.batch_path(chunk_id))
    }

    fn save_summary(&self, summary: &DocumentSummary) -> Result<(), StoreError> {
        write_json_atomic(&self.dir.join(SUMMARY_FILE), summary)?;
        debug!("Saved summary of '{}' ({} chars)", summary.source_doc, summary.summary.len());
        Ok(())
    }

    fn load_summary(&self) -> Result<Option<DocumentSummary>, StoreError> {
        read_json(&self.dir.join(SUMMARY_FILE))
    }
}

/// Read a JSON file, `None` when it does not exist
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write JSON via a temp file in the same directory, fsync, then rename
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::NotFound(path.display().to_string()))?;
    fs::create_dir_all(dir)?;

    let bytes = serde_json::to_vec_pretty(value)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

    // Directory entries are not durable until the directory itself is synced
    match File::open(dir) {
        Ok(handle) => {
            if let Err(e) = handle.sync_all() {
                warn!("Could not sync directory {}: {}", dir.display(), e);
            }
        }
        Err(e) => debug!("Could not open directory {} for sync: {}", dir.display(), e),
    }
    Ok(())
}
