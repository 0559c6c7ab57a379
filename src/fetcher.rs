//! Article fetcher: bounded-retry HTTP download plus HTML extraction.
//!
//! Transport-level failures (timeouts, connection errors) are retried up to
//! three attempts with an exponential, capped backoff. HTTP error statuses
//! are permanent: a 404 will be a 404 on the next attempt too. Every
//! terminal failure yields `None`; nothing here ever aborts a source's
//! pipeline.

use std::time::Duration;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::runner::ScraperContext;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_CAP_SECS: u64 = 10;

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static HEAD_TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static OG_TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static PARAGRAPH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Title and body text pulled out of a downloaded page.
#[derive(Debug)]
pub struct FetchedArticle {
    pub title: Option<String>,
    pub text: String,
}

/// Backoff before the attempt following `attempt` (1-based):
/// `min(2^attempt, 10)` seconds. The sequence is non-decreasing.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(BACKOFF_CAP_SECS))
}

/// Extract canonical title and body text from article HTML.
///
/// Headline preference: first `h1`, then `og:title`, then the document
/// title. Body text is every `p` element joined by blank lines; an empty
/// body is a parse failure.
pub fn extract_article(html: &str) -> Option<FetchedArticle> {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|h1| h1.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            document
                .select(&OG_TITLE_SELECTOR)
                .next()
                .and_then(|meta| meta.value().attr("content"))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
        .or_else(|| {
            document
                .select(&HEAD_TITLE_SELECTOR)
                .next()
                .map(|t| t.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        });

    let paragraphs: Vec<String> = document
        .select(&PARAGRAPH_SELECTOR)
        .map(|p| p.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let text = paragraphs.join("\n\n");
    if text.is_empty() {
        return None;
    }

    Some(FetchedArticle { title, text })
}

/// Download a URL with bounded retries, returning the response body.
///
/// Waits only between attempts; the wait is a suspending sleep, never a
/// blocked thread. Returns `None` once retries are exhausted or on the
/// first HTTP error status.
async fn download<C>(ctx: &ScraperContext<C>, url: &str) -> Option<String> {
    for attempt in 1..=MAX_ATTEMPTS {
        let result = {
            let _permit = ctx.outbound_permit().await;
            match ctx.client.get(url).send().await {
                Ok(resp) => match resp.error_for_status() {
                    Ok(resp) => resp.text().await,
                    Err(e) => {
                        warn!(url, error = %e, "Permanent HTTP error; not retrying");
                        return None;
                    }
                },
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(body) => return Some(body),
            Err(e) => {
                if attempt == MAX_ATTEMPTS {
                    warn!(url, attempts = MAX_ATTEMPTS, error = %e, "Fetch exhausted retries");
                    return None;
                }
                let delay = backoff_delay(attempt);
                warn!(url, attempt, ?delay, error = %e, "Fetch attempt failed; backing off");
                sleep(delay).await;
            }
        }
    }
    None
}

/// Fetch and parse one article URL. `None` covers both exhausted retries
/// and a page that yields no body text.
#[instrument(level = "info", skip(ctx))]
pub async fn fetch_article<C>(ctx: &ScraperContext<C>, url: &str) -> Option<FetchedArticle> {
    let body = download(ctx, url).await?;
    match extract_article(&body) {
        Some(article) => {
            debug!(url, bytes = article.text.len(), "Parsed article body");
            Some(article)
        }
        None => {
            warn!(url, "Downloaded page has no extractable body; dropping");
            None
        }
    }
}
