//! Merge every persisted batch of a session into one document

use crate::ExtractorError;
use attest_domain::traits::SessionStore;
use attest_domain::{ChunkStats, Consolidation, FailedChunk};
use tracing::{info, warn};

/// Build the consolidated view of a session
///
/// Facts come out in chunk order. Stats are summed over the persisted
/// batches, so they accumulate across resumed runs.
pub fn consolidate<S: SessionStore>(store: &S, source_doc: &str) -> Result<Consolidation, ExtractorError> {
    let state = store
        .state()
        .map_err(|e| ExtractorError::Store(e.to_string()))?;

    let mut stats = ChunkStats::default();
    let mut facts = Vec::new();

    for (&chunk_id, status) in &state.per_chunk_status {
        if !status.is_done() {
            continue;
        }
        match store
            .load_batch(chunk_id)
            .map_err(|e| ExtractorError::Store(e.to_string()))?
        {
            Some(batch) => {
                stats += batch.stats;
                facts.extend(batch.facts);
            }
            None => warn!("Chunk {} is done but its batch is missing", chunk_id),
        }
    }

    let failed_chunks: Vec<FailedChunk> = state
        .failed_chunks()
        .into_iter()
        .map(|(chunk_id, error)| FailedChunk { chunk_id, error })
        .collect();
    let pending_chunks = state.pending_chunks();

    info!(
        "Consolidated session {}: {} facts from {}/{} chunks",
        state.session_id,
        facts.len(),
        state.done_count(),
        state.chunk_count
    );

    Ok(Consolidation {
        session_id: state.session_id,
        source_doc: source_doc.to_string(),
        document_fingerprint: state.document_fingerprint,
        chunk_count: state.chunk_count,
        total_facts: facts.len(),
        stats,
        failed_chunks,
        pending_chunks,
        facts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_domain::{EvidenceQuote, Fact, LineRange};
    use attest_store::MemorySessionStore;
    use serde_json::Map;

    fn fact(claim: &str, line: usize) -> Fact {
        Fact {
            claim: claim.to_string(),
            source_doc: "doc".to_string(),
            source_location: LineRange::single(line),
            evidence_quotes: vec![EvidenceQuote::new(claim, LineRange::single(line))],
            confidence: 0.9,
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_consolidate_orders_by_chunk_and_sums_stats() {
        let store = MemorySessionStore::new("sess_test", "fp", 3);
        let stats = ChunkStats { extracted: 2, validated: 1, recovered: 0, rejected: 1 };

        for chunk_id in [2, 0] {
            store.mark_in_progress(chunk_id).unwrap();
            store
                .persist_facts(chunk_id, &[fact(&format!("fact {}", chunk_id), chunk_id + 1)], stats)
                .unwrap();
            store.mark_done(chunk_id, 1).unwrap();
        }
        store.mark_in_progress(1).unwrap();
        store.mark_failed(1, "Provider error: boom").unwrap();

        let merged = consolidate(&store, "report.txt").unwrap();

        assert_eq!(merged.session_id, "sess_test");
        assert_eq!(merged.source_doc, "report.txt");
        assert_eq!(merged.total_facts, 2);
        let claims: Vec<&str> = merged.facts.iter().map(|f| f.claim.as_str()).collect();
        assert_eq!(claims, vec!["fact 0", "fact 2"]);
        assert_eq!(merged.stats.extracted, 4);
        assert_eq!(merged.stats.rejected, 2);
        assert_eq!(
            merged.failed_chunks,
            vec![FailedChunk { chunk_id: 1, error: "Provider error: boom".to_string() }]
        );
        assert_eq!(merged.pending_chunks, vec![1]);
    }

    #[test]
    fn test_consolidate_empty_session() {
        let store = MemorySessionStore::new("sess_empty", "fp", 2);
        let merged = consolidate(&store, "doc").unwrap();
        assert!(merged.facts.is_empty());
        assert_eq!(merged.pending_chunks, vec![0, 1]);
    }
}
