//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use attest_domain::{ChunkStatus, Fact, SessionState};
use attest_extractor::RunReport;
use colored::*;
use serde::Serialize;
use serde_json::json;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// One row of a `validate` report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteCheck {
    /// Index of the fact in the input file
    pub fact_index: usize,

    /// Claim text
    pub claim: String,

    /// Quote as stored
    pub quote: String,

    /// Location as stored
    pub claimed_location: String,

    /// Where the quote matches now, if anywhere
    pub matched_location: Option<String>,

    /// Best similarity seen
    pub score: f64,

    /// `valid`, `near_miss` or `missing`
    pub status: &'static str,
}

impl QuoteCheck {
    /// True when the quote still matches the source
    pub fn is_valid(&self) -> bool {
        self.status == "valid"
    }
}

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the result of an extraction run.
    pub fn format_run(&self, session_id: &str, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "session_id": session_id,
                "total_facts": report.facts.len(),
                "stats": report.stats,
                "failed_chunks": report.failed_chunks,
            }))?),
            OutputFormat::Table => {
                let mut out = report.stats.summary();
                if !report.failed_chunks.is_empty() {
                    let mut builder = Builder::default();
                    builder.push_record(["Chunk", "Error"]);
                    for failed in &report.failed_chunks {
                        builder.push_record([failed.chunk_id.to_string(), truncate(&failed.error, 80)]);
                    }
                    out.push_str("\n\n");
                    out.push_str(&self.warning(&format!(
                        "{} chunk(s) failed; rerun with --session {} to resume",
                        report.failed_chunks.len(),
                        session_id
                    )));
                    out.push('\n');
                    out.push_str(&styled(builder));
                }
                Ok(out)
            }
        }
    }

    /// Format session progress.
    pub fn format_session(&self, state: &SessionState) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(state)?),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Chunk", "Status", "Facts", "Error"]);

                for (chunk_id, status) in &state.per_chunk_status {
                    let (facts, error) = match status {
                        ChunkStatus::Done { fact_count } => (fact_count.to_string(), String::new()),
                        ChunkStatus::Failed { error } => (String::new(), truncate(error, 60)),
                        _ => (String::new(), String::new()),
                    };
                    builder.push_record([chunk_id.to_string(), self.status_label(status), facts, error]);
                }

                let header = format!(
                    "Session {}: {}/{} chunks done, {} facts",
                    state.session_id,
                    state.done_count(),
                    state.chunk_count,
                    state.fact_count()
                );
                let header = if state.is_complete() {
                    self.success(&header)
                } else {
                    self.info(&header)
                };

                Ok(format!("{}\n{}", header, styled(builder)))
            }
        }
    }

    /// Format a list of facts.
    pub fn format_facts(&self, facts: &[Fact]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(facts)?),
            OutputFormat::Table => {
                if facts.is_empty() {
                    return Ok(self.colorize("No facts found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Location", "Claim", "Confidence"]);
                for fact in facts {
                    builder.push_record([
                        fact.source_location.to_string(),
                        truncate(&fact.claim, 70),
                        format!("{:.2}", fact.confidence),
                    ]);
                }
                Ok(styled(builder))
            }
        }
    }

    /// Format a quote validation report.
    pub fn format_checks(&self, checks: &[QuoteCheck]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(checks)?),
            OutputFormat::Table => {
                if checks.is_empty() {
                    return Ok(self.colorize("No quotes to show.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Fact", "Claimed", "Matched", "Score", "Status", "Quote"]);
                for check in checks {
                    let status = if check.is_valid() {
                        self.colorize(check.status, "green")
                    } else {
                        self.colorize(check.status, "red")
                    };
                    builder.push_record([
                        check.fact_index.to_string(),
                        check.claimed_location.clone(),
                        check.matched_location.clone().unwrap_or_else(|| "-".to_string()),
                        format!("{:.2}", check.score),
                        status,
                        truncate(&check.quote, 50),
                    ]);
                }
                Ok(styled(builder))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn status_label(&self, status: &ChunkStatus) -> String {
        let color = match status {
            ChunkStatus::Done { .. } => "green",
            ChunkStatus::Failed { .. } => "red",
            ChunkStatus::InProgress => "cyan",
            ChunkStatus::Pending => "yellow",
        };
        self.colorize(status.label(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn styled(builder: Builder) -> String {
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut)
}
