//! Attest CLI - Extract source-verifiable facts from long documents.

use attest_cli::commands;
use attest_cli::{Cli, Command, Config, Formatter};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Log to stderr so JSON output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> attest_cli::Result<()> {
    let cli = Cli::parse();

    // An explicit config file must load; the default one is created on first use
    let config = match &cli.config {
        Some(path) => Config::load(Some(path.as_path()))?,
        None => Config::load(None).unwrap_or_else(|_| {
            let cfg = Config::default();
            if let Ok(path) = Config::path() {
                if !path.exists() {
                    cfg.save(&path).ok();
                }
            }
            cfg
        }),
    };

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    let sessions_dir = match cli.sessions_dir {
        Some(dir) => dir,
        None => config.sessions_dir()?,
    };

    match cli.command {
        Command::Extract(args) => {
            commands::execute_extract(args, &config, &sessions_dir, &formatter).await?;
        }
        Command::Status(args) => {
            commands::execute_status(args, &sessions_dir, &formatter)?;
        }
        Command::Consolidate(args) => {
            commands::execute_consolidate(args, &sessions_dir, &formatter)?;
        }
        Command::Filter(args) => {
            commands::execute_filter(args, &config, &formatter)?;
        }
        Command::Validate(args) => {
            commands::execute_validate(args, &config, &formatter)?;
        }
    }

    Ok(())
}
