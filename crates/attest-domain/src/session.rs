//! Session state: per-chunk progress of one document+config pair

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Processing status of a single chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Not yet attempted
    Pending,

    /// Claimed by a worker; reclaimable after a crash
    InProgress,

    /// Facts persisted
    Done {
        /// Number of accepted facts persisted for the chunk
        fact_count: usize,
    },

    /// Last attempt failed; retried by the next run
    Failed {
        /// Error message of the last attempt
        error: String,
    },
}

impl ChunkStatus {
    /// True for `Done`
    pub fn is_done(&self) -> bool {
        matches!(self, ChunkStatus::Done { .. })
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::InProgress => "in_progress",
            ChunkStatus::Done { .. } => "done",
            ChunkStatus::Failed { .. } => "failed",
        }
    }
}

/// Durable progress record of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Session identifier, also the session directory name
    pub session_id: String,

    /// Fingerprint of document content plus chunking parameters
    pub document_fingerprint: String,

    /// Total number of chunks in the document
    pub chunk_count: usize,

    /// Status of every chunk, keyed by chunk id
    pub per_chunk_status: BTreeMap<usize, ChunkStatus>,

    /// Creation time (seconds since Unix epoch)
    pub created_at: u64,

    /// Last update time (seconds since Unix epoch)
    pub updated_at: u64,
}

impl SessionState {
    /// Fresh session with every chunk pending
    pub fn new(
        session_id: impl Into<String>,
        document_fingerprint: impl Into<String>,
        chunk_count: usize,
    ) -> Self {
        let now = unix_now();
        Self {
            session_id: session_id.into(),
            document_fingerprint: document_fingerprint.into(),
            chunk_count,
            per_chunk_status: (0..chunk_count).map(|id| (id, ChunkStatus::Pending)).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Status of a chunk
    pub fn status(&self, chunk_id: usize) -> Option<&ChunkStatus> {
        self.per_chunk_status.get(&chunk_id)
    }

    /// Every chunk id not yet `Done`, ascending
    pub fn pending_chunks(&self) -> Vec<usize> {
        self.per_chunk_status
            .iter()
            .filter(|(_, s)| !s.is_done())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Failed chunks with their last error, ascending
    pub fn failed_chunks(&self) -> Vec<(usize, String)> {
        self.per_chunk_status
            .iter()
            .filter_map(|(id, s)| match s {
                ChunkStatus::Failed { error } => Some((*id, error.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of chunks in `Done`
    pub fn done_count(&self) -> usize {
        self.per_chunk_status.values().filter(|s| s.is_done()).count()
    }

    /// Total facts recorded across done chunks
    pub fn fact_count(&self) -> usize {
        self.per_chunk_status
            .values()
            .map(|s| match s {
                ChunkStatus::Done { fact_count } => *fact_count,
                _ => 0,
            })
            .sum()
    }

    /// True when every chunk is done
    pub fn is_complete(&self) -> bool {
        self.done_count() == self.chunk_count
    }

    /// Refresh `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = unix_now();
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
