//! Sumi-Mirror main entry point
//!
//! This is the command-line interface for the Sumi-Mirror page mirroring tool.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use sumi_mirror::config::{load_config, resolve_store_root, validate, Config, STORE_ROOT_ENV};
use sumi_mirror::output::{log_statistics, metadata_report, RunStatistics};
use sumi_mirror::url::normalize_url;
use sumi_mirror::{Fetcher, MirrorMode};
use tracing_subscriber::EnvFilter;

/// Sumi-Mirror: offline copies of web pages
///
/// Sumi-Mirror fetches each URL, records link and image counts along with the
/// previous fetch time, and optionally downloads same-origin images, stylesheets
/// and scripts so the saved page renders from disk.
#[derive(Parser, Debug)]
#[command(name = "sumi-mirror")]
#[command(version)]
#[command(about = "Mirror web pages to local disk", long_about = None)]
struct Cli {
    /// URLs to fetch
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Print metadata for each fetched page
    #[arg(short = 'a', long)]
    metadata: bool,

    /// Download same-origin assets and point the saved page at them
    #[arg(short, long)]
    mirror: bool,

    /// How asset references are rewritten: filtered or blind
    #[arg(long, value_name = "MODE")]
    mirror_mode: Option<MirrorMode>,

    /// Maximum concurrent requests (0 = unlimited)
    #[arg(short = 'c', long, value_name = "N")]
    max_concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Fetch URLs one after another instead of concurrently
    #[arg(long)]
    sync: bool,

    /// Directory pages are written to (overrides ROOT_STORE_DIR)
    #[arg(long, value_name = "DIR")]
    store_root: Option<PathBuf>,

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

    let config = build_config(&cli)?;

    let store_root = resolve_store_root(
        cli.store_root.as_deref(),
        std::env::var_os(STORE_ROOT_ENV),
        &config.output,
    )?;
    tracing::info!("Storing pages under: {}", store_root.display());

    // Reject malformed URLs before anything is fetched
    for url in &cli.urls {
        normalize_url(url).with_context(|| format!("{} is not a valid URL", url))?;
    }

    run(config, store_root, &cli.urls, cli.metadata).await
}

/// Loads the optional config file and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if cli.sync {
        config.fetcher.asynchronous = false;
    }
    if cli.mirror {
        config.fetcher.mirror = true;
    }
    if let Some(mode) = cli.mirror_mode {
        config.fetcher.mirror_mode = mode;
    }
    if let Some(limit) = cli.max_concurrency {
        config.fetcher.max_concurrent_requests = limit;
    }
    if let Some(timeout) = cli.timeout {
        config.fetcher.request_timeout_secs = timeout;
    }

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

/// Runs every URL through the fetcher and logs the totals
///
/// Per-URL failures are reported and counted, never returned.
async fn run(
    config: Config,
    store_root: PathBuf,
    urls: &[String],
    print_metadata: bool,
) -> anyhow::Result<()> {
    let mut fetcher =
        Fetcher::new(&config.fetcher, store_root).context("failed to start fetcher")?;

    let stats = Arc::new(Mutex::new(RunStatistics::default()));
    let recorder = Arc::clone(&stats);
    fetcher.on_complete(move |result| {
        match &result.error {
            Some(e) => tracing::warn!("Failed to fetch {}: {}", result.url, e),
            None if print_metadata => {
                if let Some(report) = metadata_report(result) {
                    println!("{}\n", report);
                }
            }
            None => {}
        }
        recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(result);
    });

    let cancel = fetcher.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding requests");
            cancel.cancel();
        }
    });

    tracing::info!(
        "Fetching {} URL(s), mirror: {}, mode: {}",
        urls.len(),
        config.fetcher.mirror,
        config.fetcher.mirror_mode
    );

    for url in urls {
        match fetcher.submit(url).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Skipping duplicate URL: {}", url),
            // Already reported through the callback
            Err(e) => tracing::debug!("Submission of {} failed: {}", url, e),
        }
    }

    fetcher.await_all().await;

    let stats = stats.lock().unwrap_or_else(PoisonError::into_inner);
    log_statistics(&stats);
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_mirror=info,warn"),
            1 => EnvFilter::new("sumi_mirror=debug,info"),
            2 => EnvFilter::new("sumi_mirror=trace,debug"),
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
