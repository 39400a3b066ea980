//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use attest_domain::{DocumentContext, SourceDocument};
use attest_extractor::{open_session, ExtractionCoordinator, ExtractorConfig};
use attest_llm::{LlmDocumentSummarizer, LlmFactProposer, LlmQuoteRecoverer};
use attest_store::new_session_id;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Execute the extract command.
pub async fn execute_extract(
    args: ExtractArgs,
    config: &Config,
    sessions_dir: &Path,
    formatter: &Formatter,
) -> Result<()> {
    let text = fs::read_to_string(&args.file)?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => file_name(&args.file),
    };
    let document = Arc::new(SourceDocument::from_text(&name, &text));
    if document.is_empty() {
        return Err(CliError::InvalidInput(format!("{} is empty", args.file.display())));
    }

    let extractor_config = apply_overrides(config.extractor.clone(), &args)?;
    let session_id = args.session.clone().unwrap_or_else(new_session_id);
    let store = open_session(sessions_dir, &session_id, &document, &extractor_config)?;

    info!(
        "Extracting from {} ({} lines) in session {}",
        name,
        document.line_count(),
        session_id
    );
    println!("{}", formatter.info(&format!("Session: {}", session_id)));

    let mut coordinator = ExtractionCoordinator::new(
        LlmFactProposer::new(config.provider()),
        LlmQuoteRecoverer::new(config.provider()),
        store,
        extractor_config,
    )?;
    if !args.no_summary {
        coordinator = coordinator.with_summarizer(LlmDocumentSummarizer::new(config.provider()));
    }

    let mut context = DocumentContext::new(&name);
    if let Some(summary) = &args.summary {
        context = context.with_summary(summary);
    }

    let report = match args.chunks {
        Some(span) => {
            coordinator
                .run_range(document, context, span.start..=span.end)
                .await?
        }
        None => coordinator.run(document, context).await?,
    };

    println!("{}", formatter.format_run(&session_id, &report)?);
    if report.is_complete() {
        println!(
            "{}",
            formatter.success(&format!("{} facts extracted", report.facts.len()))
        );
    }

    Ok(())
}

/// Apply command-line overrides on top of the configured extractor settings.
fn apply_overrides(mut config: ExtractorConfig, args: &ExtractArgs) -> Result<ExtractorConfig> {
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }
    if let Some(size) = args.chunk_size {
        config.chunk_size = size;
    }
    if let Some(overlap) = args.overlap {
        config.chunk_overlap = overlap;
    }
    config.validate().map_err(CliError::InvalidInput)?;
    Ok(config)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
