use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Instrument};
use tracing_subscriber::EnvFilter;

use browserless_client::BrowserlessClient;
use discover_common::Config;
use discover_scout::browserless_page::BrowserlessPage;
use discover_scout::cache_store::CacheStore;
use discover_scout::refresh::run_refresh;

#[derive(Parser)]
#[command(name = "discover-scout", about = "Refresh the Perplexity Discover story cache")]
struct Cli {
    /// Path to config TOML file (overrides DISCOVER_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache file to read and replace (overrides DISCOVER_CACHE_PATH)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Scrape and reconcile, but never write the cache
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("discover=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env(cli.config.as_deref())?;
    if let Some(cache) = cli.cache {
        config.cache_path = cache;
    }
    config.log_redacted();

    let browserless_url = config
        .browserless_url
        .as_deref()
        .context("BROWSERLESS_URL is required")?;

    // One replayed session can include a goto, two selector waits and both delays.
    let fetch = &config.fetch;
    let request_timeout = fetch.navigation_timeout()
        + fetch.selector_timeout() * 2
        + fetch.scroll_delay()
        + fetch.settle_delay()
        + std::time::Duration::from_secs(30);
    let client = BrowserlessClient::with_timeout(
        browserless_url,
        config.browserless_token.as_deref(),
        request_timeout,
    )?;
    let mut page = BrowserlessPage::new(client, config.fetch.clone());
    let store = CacheStore::new(&config.cache_path);

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("refresh", run_id = %run_id);
    let report = run_refresh(&mut page, &config, &store, chrono::Utc::now(), cli.dry_run)
        .instrument(span)
        .await?;

    info!("{}", report.stats);
    info!(outcome = ?report.outcome, "Discover refresh finished");

    Ok(ExitCode::from(report.outcome.exit_code()))
}
