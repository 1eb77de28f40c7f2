//! weir command-line harness
//!
//! Dispatches seed URLs through the lifecycle engine against real HTTP and
//! reports what was delivered, dropped, and filtered. Useful for exercising
//! retry/redirect/dedup behavior against a live endpoint.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;
use weir::config::{load_settings_with_hash, Settings};
use weir::fetch::HttpFetcher;
use weir::lifecycle::{ChainError, Engine, Sink};
use weir::request::Request;
use weir::Response;

/// Request lifecycle runner: fetch seed URLs, follow retries and redirects,
/// deduplicate targets.
#[derive(Parser, Debug)]
#[command(name = "weir")]
#[command(version)]
#[command(about = "Dispatch URLs through the request lifecycle engine", long_about = None)]
struct Cli {
    /// Seed URLs to dispatch
    #[arg(value_name = "URL", required = true)]
    seeds: Vec<String>,

    /// Path to a TOML settings file; defaults apply when omitted
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Submit seeds with the duplicate-filter bypass flag set
    #[arg(long)]
    allow_duplicate: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Prints terminal chain outcomes as they resolve
struct ReportingSink;

impl Sink for ReportingSink {
    fn on_page(&self, request: &Request, response: &Response) {
        println!(
            "{}  {}  {} bytes",
            response.status,
            request.url,
            response.body.len()
        );
    }

    fn on_failure(&self, request: &Request, error: &ChainError) {
        tracing::warn!("Chain for {} ended: {}", request.url, error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let settings = match &cli.config {
        Some(path) => {
            let (settings, hash) = load_settings_with_hash(path)
                .with_context(|| format!("loading settings from {}", path.display()))?;
            tracing::info!("Settings loaded from {} (hash: {})", path.display(), hash);
            settings
        }
        None => {
            tracing::debug!("No settings file given, using defaults");
            Settings::default()
        }
    };

    let fetcher = Arc::new(HttpFetcher::new(&settings).context("building HTTP client")?);
    let sink = Arc::new(ReportingSink);
    let engine = Arc::new(Engine::new(&settings, fetcher, sink));

    let mut submitted = 0usize;
    for seed in &cli.seeds {
        let url = Url::parse(seed).with_context(|| format!("invalid seed URL '{}'", seed))?;
        let request = Request::get(url).with_allow_duplicate(cli.allow_duplicate);
        if engine.submit(request) {
            submitted += 1;
        }
    }
    tracing::info!("Submitted {} of {} seeds", submitted, cli.seeds.len());

    // Stop between hops on ctrl-c; in-flight fetches are aborted
    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            shutdown.signal();
        }
    });

    engine.run().await;

    if !cli.quiet {
        println!();
        for (key, value) in engine.stats().snapshot() {
            println!("{:>8}  {}", value, key);
        }
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("weir=info,warn"),
            1 => EnvFilter::new("weir=debug,info"),
            2 => EnvFilter::new("weir=trace,debug"),
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
