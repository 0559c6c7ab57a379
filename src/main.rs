//! # Finance News Scraper
//!
//! Ingests news articles from configured sources, keeps the ones an LLM
//! classifies as finance-related, downloads and parses their full text, and
//! writes one structured JSON snapshot per run.
//!
//! ## Usage
//!
//! ```sh
//! finance_news_scraper NewsPapers.json --limit 4
//! ```
//!
//! ## Architecture
//!
//! The scraper is a pipeline fanned out per source:
//! 1. **Feed reading**: parse each source's RSS/Atom feed into candidates
//!    (paywalled sources query a search-API fallback instead)
//! 2. **Classification**: one batched YES/NO relevance call per source
//! 3. **Fetching**: download relevant articles concurrently with bounded
//!    retries and exponential backoff
//! 4. **Output**: write the aggregate snapshot atomically
//!
//! One bad source never aborts the run; it is recorded with an empty
//! article list. Only an unreadable config is fatal.

use std::error::Error;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod classifier;
mod cli;
mod config;
mod feed;
mod fetcher;
mod models;
mod output;
mod paywall;
mod pipeline;
mod runner;
mod utils;

use classifier::ClaudeClassifier;
use cli::Cli;
use output::SNAPSHOT_FILENAME;
use runner::ScraperContext;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("finance_news_scraper starting up");

    let args = Cli::parse();
    debug!(?args.config, args.limit, args.max_in_flight, "Parsed CLI arguments");

    // Config is loaded before any network work; a bad config aborts the run
    // with a non-zero exit, everything later is recovered per source.
    let sources = match config::load_sources(&args.config) {
        Ok(sources) => sources,
        Err(e) => {
            error!(path = %args.config, error = %e, "Failed to load source config");
            return Err(e);
        }
    };
    info!(count = sources.len(), "Source registry loaded");

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let anthropic_api_key = args.anthropic_api_key.unwrap_or_default();
    if anthropic_api_key.is_empty() {
        warn!("No Anthropic API key configured; every classification batch will fail closed");
    }
    let classifier = ClaudeClassifier::new(client.clone(), anthropic_api_key);

    let ctx = ScraperContext::new(
        client,
        classifier,
        args.limit,
        args.news_api_key,
        args.max_in_flight,
    );

    let snapshot = runner::run(&ctx, &sources).await;

    output::write_snapshot(&snapshot, SNAPSHOT_FILENAME).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        sources = snapshot.newspapers.len(),
        articles = snapshot.article_count(),
        "Execution complete"
    );

    Ok(())
}
