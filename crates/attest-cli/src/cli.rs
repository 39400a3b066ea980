//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Attest - Extract source-verifiable facts from long documents.
#[derive(Debug, Parser)]
#[command(name = "attest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ATTEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding extraction sessions
    #[arg(long, global = true, env = "ATTEST_SESSIONS_DIR")]
    pub sessions_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract facts from a line-numbered text file
    Extract(ExtractArgs),

    /// Show per-chunk progress of a session
    Status(StatusArgs),

    /// Merge a session's facts into one JSON document
    Consolidate(ConsolidateArgs),

    /// Keep quantitative facts plus the most specific others
    Filter(FilterArgs),

    /// Re-check consolidated facts against their source text
    Validate(ValidateArgs),
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Text file to extract from
    pub file: PathBuf,

    /// Session ID to create or resume (new one generated if omitted)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Document name recorded on facts (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Maximum parallel chunk workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Lines per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Lines shared by consecutive chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Only process chunks in this id range (e.g. 3-7 or 4)
    #[arg(long)]
    pub chunks: Option<ChunkSpan>,

    /// Use this summary instead of asking the model for one
    #[arg(long, conflicts_with = "no_summary")]
    pub summary: Option<String>,

    /// Skip the whole-document summary step
    #[arg(long)]
    pub no_summary: bool,
}

/// Arguments for the status command.
#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Session ID
    pub session: String,
}

/// Arguments for the consolidate command.
#[derive(Debug, Parser)]
pub struct ConsolidateArgs {
    /// Session ID
    pub session: String,

    /// Output file (defaults to the session directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Document name (defaults to the name recorded on the facts)
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Arguments for the filter command.
#[derive(Debug, Parser)]
pub struct FilterArgs {
    /// Consolidated facts file
    pub input: PathBuf,

    /// Minimum share of facts with quantitative values (0.0-1.0]
    #[arg(short, long)]
    pub target: Option<f64>,

    /// Output file (defaults to <input>_filtered.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the validate command.
#[derive(Debug, Parser)]
pub struct ValidateArgs {
    /// Consolidated facts file
    pub input: PathBuf,

    /// Source text file the facts were extracted from
    pub text_file: PathBuf,

    /// Only show quotes that no longer match
    #[arg(long)]
    pub invalid_only: bool,

    /// Save the validation report as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Inclusive range of chunk ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// First chunk id
    pub start: usize,
    /// Last chunk id, inclusive
    pub end: usize,
}

impl FromStr for ChunkSpan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| format!("Invalid chunk id '{}'", part.trim()))
        };

        let (start, end) = match s.split_once('-') {
            Some((a, b)) => (parse(a)?, parse(b)?),
            None => {
                let id = parse(s)?;
                (id, id)
            }
        };
        if start > end {
            return Err(format!("Chunk range {}-{} is reversed", start, end));
        }
        Ok(Self { start, end })
    }
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_command() {
        let cli = Cli::parse_from([
            "attest",
            "extract",
            "report.txt",
            "--session",
            "sess_abc",
            "--workers",
            "8",
            "--chunks",
            "2-4",
        ]);
        match cli.command {
            Command::Extract(args) => {
                assert_eq!(args.file, PathBuf::from("report.txt"));
                assert_eq!(args.session.as_deref(), Some("sess_abc"));
                assert_eq!(args.workers, Some(8));
                assert_eq!(args.chunks, Some(ChunkSpan { start: 2, end: 4 }));
                assert!(!args.no_summary);
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_summary_flags() {
        let cli = Cli::parse_from(["attest", "extract", "report.txt", "--no-summary"]);
        match cli.command {
            Command::Extract(args) => assert!(args.no_summary && args.summary.is_none()),
            _ => panic!("Expected Extract command"),
        }

        let both = Cli::try_parse_from(["attest", "extract", "report.txt", "--no-summary", "--summary", "x"]);
        assert!(both.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["attest", "status", "sess_abc", "--format", "json", "--no-color"]);
        assert!(cli.no_color);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        assert!(matches!(cli.command, Command::Status(_)));
    }

    #[test]
    fn test_chunk_span_parsing() {
        assert_eq!("3".parse::<ChunkSpan>(), Ok(ChunkSpan { start: 3, end: 3 }));
        assert_eq!(" 1 - 5 ".parse::<ChunkSpan>(), Ok(ChunkSpan { start: 1, end: 5 }));
        assert!("5-1".parse::<ChunkSpan>().is_err());
        assert!("a-b".parse::<ChunkSpan>().is_err());
    }
}
