//! Consolidate command implementation.

use crate::cli::ConsolidateArgs;
use crate::error::Result;
use crate::output::Formatter;
use attest_domain::Consolidation;
use attest_store::FsSessionStore;
use std::fs;
use std::path::Path;

/// Execute the consolidate command.
pub fn execute_consolidate(
    args: ConsolidateArgs,
    sessions_dir: &Path,
    formatter: &Formatter,
) -> Result<()> {
    let store = FsSessionStore::open(sessions_dir, &args.session)?;

    // The session only records a fingerprint, so the name comes from the
    // flag or from the facts themselves.
    let mut consolidation = attest_extractor::consolidate(&store, "")?;
    consolidation.source_doc = document_name(&consolidation, args.name.as_deref());

    let path = match args.output {
        Some(path) => {
            write_json(&path, &consolidation)?;
            path
        }
        None => store.write_consolidation(&consolidation)?,
    };

    println!(
        "{}",
        formatter.success(&format!(
            "Consolidated {} facts from {}/{} chunks into {}",
            consolidation.total_facts,
            consolidation.chunk_count - consolidation.pending_chunks.len(),
            consolidation.chunk_count,
            path.display()
        ))
    );
    if !consolidation.pending_chunks.is_empty() {
        println!(
            "{}",
            formatter.warning(&format!(
                "{} chunk(s) not done yet: {:?}",
                consolidation.pending_chunks.len(),
                consolidation.pending_chunks
            ))
        );
    }

    Ok(())
}

fn document_name(consolidation: &Consolidation, name: Option<&str>) -> String {
    name.map(str::to_string)
        .or_else(|| consolidation.facts.first().map(|f| f.source_doc.clone()))
        .unwrap_or_else(|| consolidation.session_id.clone())
}

pub(crate) fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
