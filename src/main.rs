//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest review harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sumi_harvest::config::{load_config_with_hash, Config, StorageBackend};
use sumi_harvest::url::{normalize_base_url, prepare_page_url, target_slug};
use sumi_harvest::{submit, Harvester, ScrapeRequest};
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: A resilient paginated review harvester
///
/// Sumi-Harvest fetches every page of a target's review listing with a pool
/// of workers, rotating proxies and user agents when the target starts
/// blocking, and stores the extracted records per page.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resilient paginated review harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Listing URL of the target, e.g. https://www.example.com/review/acme.io
    #[arg(value_name = "BASE_URL")]
    base_url: String,

    /// Number of content pages to fetch (caps the discovered count)
    #[arg(long, value_name = "N")]
    pages: Option<u32>,

    /// Number of concurrent workers (overrides the config)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Proxy used for page-count discovery
    #[arg(long, env = "HTTP_PROXY_URL", value_name = "URL")]
    discovery_proxy: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the harvest plan without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(proxy) = cli.discovery_proxy.clone() {
        config.scraper.discovery_proxy = Some(proxy);
    }

    let request = ScrapeRequest {
        base_url: cli.base_url.clone(),
        page_count: cli.pages,
        worker_count: cli.workers,
    };

    if cli.dry_run {
        handle_dry_run(&config, &request)?;
    } else {
        handle_harvest(config, config_hash, request).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates inputs and shows the harvest plan
fn handle_dry_run(config: &Config, request: &ScrapeRequest) -> anyhow::Result<()> {
    let base_url = normalize_base_url(&request.base_url)
        .with_context(|| format!("Invalid base URL: {}", request.base_url))?;
    let scraper = &config.scraper;

    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", base_url);
    println!("  Slug: {}", target_slug(&base_url));
    println!(
        "  First page: {}",
        prepare_page_url(&base_url, 1, scraper.languages())
    );
    match request.page_count {
        Some(count) => println!("  Pages: {} (capped by discovery)", count),
        None => println!(
            "  Pages: discovered (fallback {})",
            scraper.fallback_max_pages
        ),
    }

    let workers = request.worker_count.unwrap_or(scraper.workers).max(1);
    println!("\nWorkers:");
    println!("  Count: {}", workers);
    println!("  Queue capacity: {}", scraper.effective_queue_capacity(workers));
    println!("  Request timeout: {}ms", scraper.request_timeout_ms);

    println!("\nRetry:");
    println!(
        "  General tier: {} retries, {}-{}ms backoff",
        config.retry.max_general_attempts,
        config.retry.general_base_delay_ms,
        config.retry.general_max_delay_ms
    );
    println!(
        "  Block tier: {} attempts, schedule {:?}ms",
        config.retry.max_block_attempts, config.retry.block_backoff_ms
    );

    let throttle = &config.throttle;
    println!("\nThrottle:");
    println!(
        "  Page delay: {}-{}ms",
        throttle.page_delay_min_ms, throttle.page_delay_max_ms
    );
    println!(
        "  Batch: every {} pages, {}-{}ms",
        throttle.batch_size, throttle.batch_delay_min_ms, throttle.batch_delay_max_ms
    );
    println!(
        "  Global pause: every {} pages, {}-{}ms",
        throttle.global_pause_every, throttle.global_pause_min_ms, throttle.global_pause_max_ms
    );

    println!("\nIdentity:");
    println!("  User agents: {}", config.identity.user_agents.len());
    println!("  Inline proxies: {}", config.identity.proxies.len());
    if let Some(path) = &config.identity.proxy_file {
        println!("  Proxy file: {}", path.display());
    }
    if let Some(proxy) = &scraper.discovery_proxy {
        println!("  Discovery proxy: {}", proxy);
    }

    println!("\nOutput:");
    match config.output.backend {
        StorageBackend::Json => println!("  JSON directory: {}", config.output.directory),
        StorageBackend::Sqlite => {
            println!("  SQLite database: {}", config.output.database_path().display())
        }
    }
    if let Some(path) = &config.output.retry_log_path {
        println!("  Retry log: {}", path);
    }
    if let Some(path) = &config.output.summary_path {
        println!("  Summary: {}", path);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
    request: ScrapeRequest,
) -> anyhow::Result<()> {
    let harvester = Harvester::new(config)
        .context("Failed to set up harvester")?
        .with_config_hash(config_hash);

    let handle = submit(Arc::new(harvester), request)?;
    tracing::info!("{}", handle.ack.message);

    match handle.wait().await {
        Ok(summary) => {
            tracing::info!(
                status = %summary.status,
                duration_seconds = summary.duration_seconds,
                "Harvest completed"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
