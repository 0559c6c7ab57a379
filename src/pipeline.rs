//! Per-source pipeline: read feed, classify the candidate batch, fetch the
//! relevant articles concurrently, assemble the source's result.
//!
//! Every stage degrades to an empty or smaller result instead of raising;
//! a source that fails at any point still comes back as a `Newspaper`
//! (possibly with no articles) so the run coordinator can record it.

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::classifier::Classifier;
use crate::config::Source;
use crate::feed::read_feed;
use crate::fetcher::{fetch_article, FetchedArticle};
use crate::models::{Article, Candidate, Newspaper};
use crate::paywall::scrape_paywalled;
use crate::runner::ScraperContext;

/// Fetch fan-out within one source. The run-wide semaphore still bounds
/// total outbound requests across all sources.
const FETCH_FANOUT: usize = 8;

/// Run the batch classifier and fail closed: any transport error or
/// malformed response marks every candidate in the batch irrelevant for
/// this run. Deliberate policy, not error swallowing: an ambiguous signal
/// must never admit content.
pub async fn classify_fail_closed<C: Classifier>(
    ctx: &ScraperContext<C>,
    titles: &[String],
) -> Vec<bool> {
    if titles.is_empty() {
        return Vec::new();
    }

    let _permit = ctx.outbound_permit().await;
    match ctx.classifier.classify(titles).await {
        Ok(decisions) => decisions,
        Err(e) => {
            warn!(batch = titles.len(), error = %e, "Classification failed; rejecting batch");
            vec![false; titles.len()]
        }
    }
}

/// Keep the candidates whose decision is `true`, preserving discovery order.
pub fn select_relevant(candidates: Vec<Candidate>, decisions: &[bool]) -> Vec<Candidate> {
    candidates
        .into_iter()
        .zip(decisions)
        .filter_map(|(candidate, &keep)| keep.then_some(candidate))
        .collect()
}

/// Fetch a set of URLs concurrently, slotting each result back at its input
/// index. Arrival order carries no meaning; correspondence between a result
/// and its originating candidate is by index only.
pub async fn fetch_indexed<C>(
    ctx: &ScraperContext<C>,
    urls: impl Iterator<Item = String>,
) -> Vec<Option<FetchedArticle>> {
    let urls: Vec<String> = urls.collect();
    let mut results: Vec<Option<FetchedArticle>> = Vec::new();
    results.resize_with(urls.len(), || None);

    let mut fetches = stream::iter(urls.into_iter().enumerate())
        .map(|(i, url)| async move { (i, fetch_article(ctx, &url).await) })
        .buffer_unordered(FETCH_FANOUT);

    while let Some((i, fetched)) = fetches.next().await {
        results[i] = fetched;
    }
    results
}

/// Drive one source end-to-end and always come back with a result to
/// record. Paywalled sources branch to the search-API fallback; everything
/// else goes feed → classify → fetch.
#[instrument(level = "info", skip(ctx, source), fields(source = %source.name))]
pub async fn scrape_source<C: Classifier>(ctx: &ScraperContext<C>, source: &Source) -> Newspaper {
    if source.paywalled {
        return scrape_paywalled(ctx, source).await;
    }

    let mut paper = Newspaper::empty(source.feed.clone(), source.link.clone());
    let feed_url = match source.feed.as_deref() {
        Some(url) => url,
        None => return paper,
    };

    let candidates = read_feed(ctx, feed_url, ctx.limit).await;
    if candidates.is_empty() {
        info!(source = %source.name, "Feed yielded no candidates");
        return paper;
    }

    let titles: Vec<String> = candidates.iter().map(|c| c.title.clone()).collect();
    let decisions = classify_fail_closed(ctx, &titles).await;
    let relevant = select_relevant(candidates, &decisions);
    if relevant.is_empty() {
        info!(source = %source.name, "No finance-related candidates");
        return paper;
    }

    info!(
        source = %source.name,
        relevant = relevant.len(),
        "Fetching relevant articles"
    );
    let fetched = fetch_indexed(ctx, relevant.iter().map(|c| c.link.clone())).await;

    for (candidate, fetched) in relevant.into_iter().zip(fetched) {
        if let Some(full) = fetched {
            paper.articles.push(Article {
                title: full.title.unwrap_or_else(|| candidate.title.clone()),
                text: full.text,
                link: candidate.link,
                published: candidate.published,
            });
        }
    }

    info!(
        source = %source.name,
        count = paper.articles.len(),
        "Source pipeline complete"
    );
    paper
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScraperContext;
    use std::error::Error;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    struct StubClassifier {
        decisions: Result<Vec<bool>, String>,
    }

    impl Classifier for StubClassifier {
        async fn classify(&self, _titles: &[String]) -> Result<Vec<bool>, Box<dyn Error>> {
            match &self.decisions {
                Ok(d) => Ok(d.clone()),
                Err(e) => Err(e.clone().into()),
            }
        }
    }

    fn candidates(titles: &[&str]) -> Vec<Candidate> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| Candidate {
                title: t.to_string(),
                link: format!("https://example.com/{i}"),
                published: "2025-03-01T12:00:00+00:00".to_string(),
            })
            .collect()
    }

    fn test_ctx(classifier: StubClassifier) -> ScraperContext<StubClassifier> {
        ScraperContext::new(reqwest::Client::new(), classifier, 4, None, 4)
    }

    #[test]
    fn test_select_relevant_preserves_order() {
        let selected = select_relevant(candidates(&["a", "b", "c", "d"]), &[true, false, true, true]);
        let titles: Vec<&str> = selected.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_select_relevant_all_rejected() {
        let selected = select_relevant(candidates(&["a", "b"]), &[false, false]);
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn test_classify_fail_closed_passes_decisions_through() {
        let ctx = test_ctx(StubClassifier {
            decisions: Ok(vec![true, false, true]),
        });
        let titles = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(classify_fail_closed(&ctx, &titles).await, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_classify_fail_closed_rejects_batch_on_error() {
        let ctx = test_ctx(StubClassifier {
            decisions: Err("api unreachable".to_string()),
        });
        let titles = vec!["a".to_string(), "b".to_string()];
        assert_eq!(classify_fail_closed(&ctx, &titles).await, vec![false, false]);
    }

    #[tokio::test]
    async fn test_classify_fail_closed_empty_batch() {
        let ctx = test_ctx(StubClassifier {
            decisions: Ok(vec![]),
        });
        assert!(classify_fail_closed(&ctx, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_scrape_source_without_feed_is_empty_not_a_crash() {
        // A non-paywalled source with no feed cannot occur via the loader,
        // but the pipeline still has to hold its ground.
        let ctx = test_ctx(StubClassifier {
            decisions: Ok(vec![]),
        });
        let source = Source {
            name: "B".to_string(),
            feed: None,
            link: "http://b".to_string(),
            paywalled: false,
        };
        let paper = scrape_source(&ctx, &source).await;
        assert!(paper.articles.is_empty());
        assert_eq!(paper.link, "http://b");
    }

    async fn respond(sock: &mut TcpStream, content_type: &str, body: &str) {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = sock.write_all(response.as_bytes()).await;
        let _ = sock.shutdown().await;
    }

    /// A local news source: `/rss` serves a two-entry feed, `/good` serves
    /// an article page, and `/bad` drops the connection before responding.
    async fn start_test_source() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let n = sock.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let addr = sock.local_addr().unwrap();
                    match path.as_str() {
                        "/rss" => {
                            let feed = format!(
                                r#"<rss version="2.0"><channel>
<item><title>Markets rally</title><link>http://{addr}/good</link><pubDate>Sat, 01 Mar 2025 12:00:00 GMT</pubDate></item>
<item><title>Crypto slides</title><link>http://{addr}/bad</link><pubDate>Sat, 01 Mar 2025 13:00:00 GMT</pubDate></item>
</channel></rss>"#
                            );
                            respond(&mut sock, "application/rss+xml", &feed).await;
                        }
                        "/good" => {
                            let html = "<html><body><h1>Markets rally</h1>\
                                        <p>Stocks climbed.</p></body></html>";
                            respond(&mut sock, "text/html", html).await;
                        }
                        _ => drop(sock),
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_exhausted_fetch_drops_article_but_keeps_siblings() {
        let addr = start_test_source().await;
        let ctx = test_ctx(StubClassifier {
            decisions: Ok(vec![true, true]),
        });
        let source = Source {
            name: "Local".to_string(),
            feed: Some(format!("http://{addr}/rss")),
            link: format!("http://{addr}"),
            paywalled: false,
        };

        let paper = scrape_source(&ctx, &source).await;

        // The /bad entry fails all three attempts and is absent; its
        // sibling still appears, with feed metadata intact.
        assert_eq!(paper.articles.len(), 1);
        assert_eq!(paper.articles[0].title, "Markets rally");
        assert!(paper.articles[0].link.ends_with("/good"));
        assert_eq!(paper.articles[0].text, "Stocks climbed.");
        assert_eq!(paper.articles[0].published, "2025-03-01T12:00:00+00:00");
    }

    #[tokio::test]
    async fn test_scrape_source_invalid_feed_url_yields_empty() {
        let ctx = test_ctx(StubClassifier {
            decisions: Ok(vec![]),
        });
        let source = Source {
            name: "B".to_string(),
            feed: Some("not-a-url".to_string()),
            link: "http://b".to_string(),
            paywalled: false,
        };
        let paper = scrape_source(&ctx, &source).await;
        assert!(paper.articles.is_empty());
        assert_eq!(paper.rss.as_deref(), Some("not-a-url"));
    }
}
