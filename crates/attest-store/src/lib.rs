//! Attest Session Storage
//!
//! Implements the `SessionStore` trait twice:
//!
//! - [`FsSessionStore`]: one directory per session, every mutation written
//!   with write-to-temp, fsync and rename, so a crash never leaves a torn file
//! - [`MemorySessionStore`]: same semantics without durability, for
//!   session-less runs and tests
//!
//! # Layout
//!
//! ```text
//! <sessions_dir>/<session_id>/session.json
//! <sessions_dir>/<session_id>/facts/chunk_0000.json
//! <sessions_dir>/<session_id>/summary.json
//! <sessions_dir>/<session_id>/consolidated_facts.json
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use attest_store::FsSessionStore;
//! use attest_domain::traits::SessionStore;
//!
//! let store = FsSessionStore::create_or_load("sessions", "sess_demo", "fingerprint", 4).unwrap();
//! assert_eq!(store.pending_chunks().unwrap(), vec![0, 1, 2, 3]);
//! ```

#![warn(missing_docs)]

mod fs;
mod ledger;
mod memory;

pub use fs::FsSessionStore;
pub use memory::MemorySessionStore;

use thiserror::Error;

/// Errors that can occur during session storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session file could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Existing session was created for a different document or chunking
    #[error("Session conflict for '{session_id}': stored fingerprint {stored}, requested {requested}")]
    SessionConflict {
        /// Session id
        session_id: String,

        /// Fingerprint found on disk
        stored: String,

        /// Fingerprint of the current document and config
        requested: String,
    },

    /// Session does not exist
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Chunk id outside the session
    #[error("Unknown chunk {chunk_id} (session has {chunk_count} chunks)")]
    UnknownChunk {
        /// Requested chunk id
        chunk_id: usize,

        /// Number of chunks in the session
        chunk_count: usize,
    },

    /// Internal lock was poisoned
    #[error("Store lock error: {0}")]
    Lock(String),
}

/// Generate a new session id of the form `sess_<12 hex chars>`
pub fn new_session_id() -> String {
    let id = uuid::Uuid::now_v7().simple().to_string();
    format!("sess_{}", &id[id.len() - 12..])
}
