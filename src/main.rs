//! Otomoto scraper main entry point
//!
//! Runs one crawl session with the configured defaults, or drives the
//! scheduled-trigger adapter when invoked with `scheduled`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use otomoto_scraper::config::{load_config_with_hash, Config};
use otomoto_scraper::crawler::run_session;
use otomoto_scraper::trigger::{handle_scheduled, InvocationContext, TriggerStatus};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Otomoto scraper: snapshot the vehicle listings of one search query
///
/// With no arguments, crawls the query from `OTOMOTO_URL` (or the built-in
/// default) and appends new listings to a JSONL file.
#[derive(Parser, Debug)]
#[command(name = "otomoto-scraper")]
#[command(version)]
#[command(about = "Snapshot vehicle listings into a JSONL file", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run as a scheduled trigger and print a structured JSON result
    Scheduled {
        /// JSON file with the trigger event payload
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        None => handle_run(cli.config.as_deref()).await,
        Some(Command::Scheduled { event }) => {
            handle_scheduled_run(cli.config.as_deref(), event.as_deref()).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("otomoto_scraper=info,warn"),
            1 => EnvFilter::new("otomoto_scraper=debug,info"),
            _ => EnvFilter::new("otomoto_scraper=trace,debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file when given, otherwise defaults plus environment
fn resolve_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => Ok(Config::from_env().context("Invalid configuration from environment")?),
    }
}

/// Runs a single crawl session and prints a one-line summary
async fn handle_run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = resolve_config(config_path)?;

    tracing::info!("Start scraping {}", config.crawler.start_url);
    let summary = run_session(&config).await?;

    println!(
        "Finished. Collected {} offers in this run ({}).",
        summary.records.len(),
        summary.output_path.display()
    );

    Ok(())
}

/// Runs the scheduled-trigger adapter and prints its response as JSON
async fn handle_scheduled_run(
    config_path: Option<&Path>,
    event_path: Option<&Path>,
) -> anyhow::Result<()> {
    let event = match event_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read event {}", path.display()))?;
            serde_json::from_str(&raw).context("Event is not valid JSON")?
        }
        None => serde_json::json!({}),
    };

    let config = resolve_config(config_path)?;
    let context = InvocationContext::from_env();

    let response = handle_scheduled(&event, &context, &config).await;
    println!("{}", serde_json::to_string(&response)?);

    if response.status() == TriggerStatus::Error {
        std::process::exit(1);
    }

    Ok(())
}
