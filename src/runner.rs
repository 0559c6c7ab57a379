//! Run coordinator: fans the source pipeline out over every registered
//! source, bounds total outbound requests, and assembles the snapshot.
//!
//! A failing source never blocks its siblings; it is recorded with an empty
//! article list. On Ctrl-C the coordinator stops consuming and hands back
//! whatever sources have already completed, so an interrupted run still
//! emits a snapshot.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{info, instrument, warn};

use crate::classifier::Classifier;
use crate::config::Source;
use crate::models::{Newspaper, Snapshot};
use crate::pipeline::scrape_source;

/// Source-level fan-out. Request-level parallelism is governed separately
/// by the outbound semaphore.
const SOURCE_FANOUT: usize = 16;

/// Everything the pipeline needs, constructed once in `main` and threaded
/// down by parameter. Holds the shared HTTP client, the classifier, and the
/// semaphore bounding simultaneous outbound requests across both fan-out
/// levels (sources and per-source article fetches).
pub struct ScraperContext<C> {
    pub client: reqwest::Client,
    pub classifier: C,
    /// Maximum entries read per feed.
    pub limit: usize,
    pub news_api_key: Option<String>,
    outbound: Arc<Semaphore>,
}

impl<C> ScraperContext<C> {
    pub fn new(
        client: reqwest::Client,
        classifier: C,
        limit: usize,
        news_api_key: Option<String>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            client,
            classifier,
            limit,
            news_api_key,
            outbound: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Acquire a slot in the outbound request pool. Held for the duration of
    /// one network call; backoff sleeps happen outside the permit.
    pub async fn outbound_permit(&self) -> SemaphorePermit<'_> {
        // The semaphore is never closed, so acquire cannot fail.
        match self.outbound.acquire().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("outbound semaphore closed"),
        }
    }
}

/// Scrape every registered source concurrently and collect one `Newspaper`
/// per source into the snapshot. Returns early (with the sources finished
/// so far) if the process is interrupted.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn run<C: Classifier>(ctx: &ScraperContext<C>, sources: &[Source]) -> Snapshot {
    let mut snapshot = Snapshot::default();

    let mut results = stream::iter(sources.iter())
        .map(|source| async move {
            info!(source = %source.name, paywalled = source.paywalled, "Processing source");
            (source.name.clone(), scrape_source(ctx, source).await)
        })
        .buffer_unordered(SOURCE_FANOUT);

    loop {
        tokio::select! {
            next = results.next() => match next {
                Some((name, paper)) => {
                    info!(source = %name, articles = paper.articles.len(), "Source settled");
                    snapshot.insert(name, paper);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!(
                    completed = snapshot.newspapers.len(),
                    total = sources.len(),
                    "Interrupted; flushing completed sources"
                );
                break;
            }
        }
    }

    // Sources cut off by an interrupt are still part of the run's shape.
    for source in sources {
        if !snapshot.newspapers.contains_key(&source.name) {
            snapshot.insert(
                source.name.clone(),
                Newspaper::empty(source.feed.clone(), source.link.clone()),
            );
        }
    }

    info!(
        sources = snapshot.newspapers.len(),
        articles = snapshot.article_count(),
        "Run complete"
    );
    snapshot
}
