//! Doc-Ferry main entry point
//!
//! This is the command-line interface for the Doc-Ferry migration tool.

use anyhow::Context;
use clap::Parser;
use doc_ferry::config::{load_config_with_hash, validate, validate_store_url, Config};
use doc_ferry::pipeline::{Ferry, Operation, ShutdownSignal};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Doc-Ferry: document migration between searchable stores
///
/// Copies documents from one store into another, wipes a store, or feeds a
/// store with content crawled from a rate-limited provider.
#[derive(Parser, Debug)]
#[command(name = "doc-ferry")]
#[command(version = "1.0.0")]
#[command(about = "Bulk document migration and rate-limited content feeding", long_about = None)]
struct Cli {
    /// Target store URL (sqlite://<path>, sqlite::memory: or http(s)://host/index)
    #[arg(long, value_name = "URL")]
    url: String,

    /// Command to run: deleteAll, fillFrom, copyStaticTweets or copyUsers
    #[arg(long, value_name = "COMMAND")]
    cmd: Operation,

    /// Source store URL for fillFrom and copyUsers
    #[arg(long = "url-from", alias = "url.from", value_name = "URL")]
    url_from: Option<String>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            let config = Config::default();
            validate(&config).context("default configuration is invalid")?;
            config
        }
    };

    validate_store_url(&cli.url).context("invalid --url")?;
    if let Some(source) = &cli.url_from {
        validate_store_url(source).context("invalid --url-from")?;
    }

    let cancel = CancellationToken::new();
    ShutdownSignal::listen()
        .context("failed to install signal handlers")?
        .cancel_on_signal(cancel.clone());

    let ferry = Ferry::new(config).context("failed to build HTTP client")?;
    match ferry
        .run(cli.cmd, &cli.url, cli.url_from.as_deref(), cancel)
        .await
    {
        Ok(summary) => {
            tracing::info!("{} finished: {}", cli.cmd, summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("{} failed: {}", cli.cmd, e);
            Err(e).with_context(|| format!("{} failed", cli.cmd))
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("doc_ferry=info,warn"),
            1 => EnvFilter::new("doc_ferry=debug,info"),
            2 => EnvFilter::new("doc_ferry=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
