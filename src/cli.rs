//! Command-line interface for the finance news scraper.
//!
//! One positional argument (the newspaper config file) plus tuning flags.
//! API keys can come from flags or the environment. Clap rejects invalid
//! flag values (e.g. a non-integer `--limit`) with a non-zero exit before
//! any network activity happens.

use clap::Parser;

/// Command-line arguments for the scraper.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the newspaper config file (JSON map of source name to
    /// {"rss": <feed url>, "link": <homepage>})
    #[arg(default_value = "NewsPapers.json")]
    pub config: String,

    /// Maximum entries read per feed
    #[arg(long, default_value_t = 4)]
    pub limit: usize,

    /// Maximum simultaneous outbound requests across all sources
    #[arg(long, default_value_t = 16)]
    pub max_in_flight: usize,

    /// Anthropic API key for relevance classification
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// NewsAPI key for the paywall-fallback path
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,
}
