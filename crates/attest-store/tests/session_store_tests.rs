//! Integration tests for attest-store
//!
//! These tests exercise the session lifecycle across store instances, the way
//! a crashed and restarted run sees it.

use attest_domain::traits::SessionStore;
use attest_domain::{ChunkStats, ChunkStatus, EvidenceQuote, Fact, LineRange};
use attest_store::{FsSessionStore, StoreError};
use std::sync::Arc;
use tempfile::TempDir;

fn fact(claim: &str, line: usize) -> Fact {
    Fact {
        claim: claim.to_string(),
        source_doc: "report.txt".to_string(),
        source_location: LineRange::single(line),
        evidence_quotes: vec![EvidenceQuote::new(claim, LineRange::single(line))],
        confidence: 0.95,
        metadata: Default::default(),
    }
}

#[test]
fn test_resume_keeps_done_chunks() {
    let tmp = TempDir::new().unwrap();

    {
        let store = FsSessionStore::create_or_load(tmp.path(), "sess_resume", "fp-1", 3).unwrap();
        assert!(store.mark_in_progress(0).unwrap());
        store
            .persist_facts(0, &[fact("A", 1), fact("B", 2)], ChunkStats { extracted: 3, validated: 2, recovered: 0, rejected: 1 })
            .unwrap();
        store.mark_done(0, 2).unwrap();

        // Chunk 1 was claimed when the process died
        assert!(store.mark_in_progress(1).unwrap());
    }

    let store = FsSessionStore::create_or_load(tmp.path(), "sess_resume", "fp-1", 3).unwrap();
    assert_eq!(store.pending_chunks().unwrap(), vec![1, 2]);
    assert_eq!(store.state().unwrap().status(1), Some(&ChunkStatus::InProgress));
    assert!(store.mark_in_progress(1).unwrap(), "stale claim must be reclaimable");
    assert!(!store.mark_in_progress(0).unwrap(), "done chunk must not be reclaimed");

    let batch = store.load_batch(0).unwrap().unwrap();
    assert_eq!(batch.stats.rejected, 1);
    assert_eq!(batch.facts, vec![fact("A", 1), fact("B", 2)]);
}

#[test]
fn test_fingerprint_mismatch_is_conflict() {
    let tmp = TempDir::new().unwrap();
    FsSessionStore::create_or_load(tmp.path(), "sess_conflict", "fp-1", 3).unwrap();

    let result = FsSessionStore::create_or_load(tmp.path(), "sess_conflict", "fp-2", 3);
    match result {
        Err(StoreError::SessionConflict { stored, requested, .. }) => {
            assert_eq!(stored, "fp-1");
            assert_eq!(requested, "fp-2");
        }
        other => panic!("expected conflict, got {:?}", other.map(|_| ())),
    }

    // The original session is untouched
    let store = FsSessionStore::open(tmp.path(), "sess_conflict").unwrap();
    assert_eq!(store.state().unwrap().document_fingerprint, "fp-1");
}

#[test]
fn test_concurrent_claims_are_exclusive() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(FsSessionStore::create_or_load(tmp.path(), "sess_race", "fp", 1).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.mark_in_progress(0).unwrap())
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|claimed| *claimed)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn test_mark_done_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = FsSessionStore::create_or_load(tmp.path(), "sess_idem", "fp", 1).unwrap();

    store.mark_in_progress(0).unwrap();
    store.mark_done(0, 4).unwrap();
    store.mark_done(0, 4).unwrap();

    let reopened = FsSessionStore::open(tmp.path(), "sess_idem").unwrap();
    assert_eq!(reopened.state().unwrap().status(0), Some(&ChunkStatus::Done { fact_count: 4 }));
    assert!(reopened.state().unwrap().is_complete());
}
