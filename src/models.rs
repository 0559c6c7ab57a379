//! Data models for candidate entries, scraped articles, and the run snapshot.
//!
//! The shapes here mirror the output document exactly:
//! `{"newspapers": {<source_name>: {"rss"?, "link", "articles": [...]}}}`.
//! The snapshot map is a `BTreeMap` so the serialized document is laid out
//! identically across runs with the same inputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An unclassified feed entry awaiting a relevance decision.
///
/// Candidates are produced by the feed reader (or the paywall fallback) and
/// discarded after classification if irrelevant. They are never written to
/// the snapshot directly.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Entry headline, as published by the feed.
    pub title: String,
    /// Absolute URL of the article.
    pub link: String,
    /// Publication timestamp, normalized to RFC 3339.
    pub published: String,
}

/// A fully scraped article as it appears in the snapshot.
///
/// An `Article` exists only for candidates that classified relevant and
/// whose fetch+parse succeeded, or for paywall-fallback items carrying
/// description-only text. There are no partial records.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Article {
    pub title: String,
    pub text: String,
    pub link: String,
    pub published: String,
}

/// Per-source result: the articles kept for one newspaper, in
/// feed-discovery order.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Newspaper {
    /// The configured feed URL, echoed back even when invalid. Omitted for
    /// paywall-fallback sources that have no feed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss: Option<String>,
    /// Homepage link from the source config.
    pub link: String,
    pub articles: Vec<Article>,
}

impl Newspaper {
    /// An empty result carrying only the source's configured URLs. Used for
    /// every recovered per-source failure (invalid feed, empty feed, no
    /// relevant entries, dead fallback API).
    pub fn empty(rss: Option<String>, link: String) -> Self {
        Self {
            rss,
            link,
            articles: Vec::new(),
        }
    }
}

/// The aggregate result of one run, keyed by source name. The sole
/// externally visible artifact; built once and written atomically at the
/// end of the run.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Snapshot {
    pub newspapers: BTreeMap<String, Newspaper>,
}

impl Snapshot {
    pub fn insert(&mut self, name: String, paper: Newspaper) {
        self.newspapers.insert(name, paper);
    }

    pub fn article_count(&self) -> usize {
        self.newspapers.values().map(|p| p.articles.len()).sum()
    }
}
