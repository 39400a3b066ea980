//! Opening the durable session that belongs to a document

use crate::chunking::Chunker;
use crate::config::ExtractorConfig;
use crate::ExtractorError;
use attest_domain::SourceDocument;
use attest_store::FsSessionStore;
use std::path::Path;

/// Create or resume the session for `document` chunked under `config`
///
/// Fails with `SessionConflict` when `session_id` already exists for a
/// different document or chunking.
pub fn open_session(
    sessions_dir: impl AsRef<Path>,
    session_id: &str,
    document: &SourceDocument,
    config: &ExtractorConfig,
) -> Result<FsSessionStore, ExtractorError> {
    let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
    let fingerprint = document.fingerprint(config.chunk_size, config.chunk_overlap);
    let store = FsSessionStore::create_or_load(
        sessions_dir,
        session_id,
        &fingerprint,
        chunker.chunk_count(document.line_count()),
    )?;
    Ok(store)
}
