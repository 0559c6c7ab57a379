//! Source registry: loads the newspaper config file and derives the
//! paywall routing decision for each source.
//!
//! The config file is a JSON map of source name to `{"rss": <feed url>,
//! "link": <homepage>}`. The `rss` key is optional; sources without it are
//! routed through the paywall-fallback path keyed on the homepage domain.
//! A config that cannot be read or parsed is the only fatal error in the
//! scraper: nothing has been scraped yet, so aborting is safe.

use std::collections::BTreeMap;
use std::error::Error;

use serde::Deserialize;
use tracing::{info, instrument};
use url::Url;

/// Domains whose articles sit behind a hard paywall. Sources resolving to
/// one of these skip feed parsing and use the search-API fallback.
pub const PAYWALLED_DOMAINS: &[&str] = &[
    "wsj.com",
    "nytimes.com",
    "ft.com",
    "washingtonpost.com",
    "cnn.com",
];

/// Raw per-source entry as it appears in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "rss")]
    pub feed: Option<String>,
    pub link: String,
}

/// One registered news source. Immutable after load.
#[derive(Debug, Clone)]
pub struct Source {
    /// Unique source name, the key in the config file and in the snapshot.
    pub name: String,
    /// Feed URL, if the source has one.
    pub feed: Option<String>,
    /// Homepage link; for paywalled sources this keys the fallback query.
    pub link: String,
    /// Whether this source goes through the paywall-fallback path.
    pub paywalled: bool,
}

/// Extract the registrable host of a URL, with any `www.` prefix removed.
/// Returns `None` for unparseable URLs.
pub fn domain_of(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

fn is_paywalled_domain(link: &str) -> bool {
    match domain_of(link) {
        Some(host) => PAYWALLED_DOMAINS
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}"))),
        None => false,
    }
}

/// Load the source registry from a config file.
///
/// Sources come back ordered by name. A source is paywalled when it has no
/// feed URL or when its homepage resolves to a known paywalled domain.
#[instrument(level = "info")]
pub fn load_sources(path: &str) -> Result<Vec<Source>, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    let parsed: BTreeMap<String, SourceConfig> = serde_json::from_str(&raw)?;

    let sources: Vec<Source> = parsed
        .into_iter()
        .map(|(name, cfg)| {
            let paywalled = cfg.feed.is_none() || is_paywalled_domain(&cfg.link);
            Source {
                name,
                feed: cfg.feed,
                link: cfg.link,
                paywalled,
            }
        })
        .collect();

    info!(count = sources.len(), path, "Loaded source registry");
    Ok(sources)
}
