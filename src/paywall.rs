//! Paywall fallback: sources without a usable feed are queried through the
//! NewsAPI search endpoint, scoped to the source's domain.
//!
//! Fallback candidates go through the same relevance classifier as feed
//! entries. Relevant items are capped at five per source; a full fetch is
//! still attempted for each, but a paywalled page that cannot be fetched
//! keeps its short NewsAPI description instead of full text. This is the
//! one path where an article may carry description-only text.

use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::classifier::Classifier;
use crate::config::{domain_of, Source};
use crate::models::{Article, Candidate, Newspaper};
use crate::pipeline::{classify_fail_closed, fetch_indexed};
use crate::runner::ScraperContext;

const NEWSAPI_URL: &str = "https://newsapi.org/v2/everything";
const NEWSAPI_QUERY: &str = "finance OR stock OR crypto OR economy";
const MAX_FALLBACK_ARTICLES: usize = 5;
const PAYWALL_PLACEHOLDER: &str = "Full content behind paywall.";

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

async fn search_domain<C>(ctx: &ScraperContext<C>, domain: &str) -> Vec<NewsApiArticle> {
    let api_key = match ctx.news_api_key.as_deref() {
        Some(key) if !key.is_empty() => key,
        _ => {
            warn!(domain, "No NewsAPI key configured; skipping paywalled source");
            return Vec::new();
        }
    };

    let _permit = ctx.outbound_permit().await;
    let response = ctx
        .client
        .get(NEWSAPI_URL)
        .query(&[
            ("q", NEWSAPI_QUERY),
            ("domains", domain),
            ("apiKey", api_key),
        ])
        .send()
        .await;

    match response {
        Ok(resp) => match resp.error_for_status() {
            Ok(resp) => match resp.json::<NewsApiResponse>().await {
                Ok(parsed) => parsed.articles,
                Err(e) => {
                    warn!(domain, error = %e, "Malformed NewsAPI response");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(domain, error = %e, "NewsAPI returned error status");
                Vec::new()
            }
        },
        Err(e) => {
            warn!(domain, error = %e, "NewsAPI request failed");
            Vec::new()
        }
    }
}

fn to_candidates(raw: Vec<NewsApiArticle>) -> Vec<(Candidate, Option<String>)> {
    raw.into_iter()
        .filter_map(|a| {
            let title = a.title?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let candidate = Candidate {
                title,
                link: a.url?,
                published: a.published_at?,
            };
            Some((candidate, a.description))
        })
        .collect()
}

/// Scrape a paywalled source end-to-end: search, classify the full candidate
/// set, cap to the first five relevant, then try to upgrade each to full
/// text via a normal fetch.
#[instrument(level = "info", skip(ctx, source), fields(source = %source.name))]
pub async fn scrape_paywalled<C: Classifier>(
    ctx: &ScraperContext<C>,
    source: &Source,
) -> Newspaper {
    let mut paper = Newspaper::empty(source.feed.clone(), source.link.clone());

    let domain = match domain_of(&source.link) {
        Some(domain) => domain,
        None => {
            warn!(link = %source.link, "Cannot derive a domain for fallback query");
            return paper;
        }
    };

    let candidates = to_candidates(search_domain(ctx, &domain).await);
    if candidates.is_empty() {
        info!(%domain, "Fallback search returned no usable candidates");
        return paper;
    }

    let titles: Vec<String> = candidates.iter().map(|(c, _)| c.title.clone()).collect();
    let decisions = classify_fail_closed(ctx, &titles).await;

    let relevant: Vec<(Candidate, Option<String>)> = candidates
        .into_iter()
        .zip(decisions)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .take(MAX_FALLBACK_ARTICLES)
        .collect();

    if relevant.is_empty() {
        info!(%domain, "No finance-related fallback articles");
        return paper;
    }

    let fetched = fetch_indexed(ctx, relevant.iter().map(|(c, _)| c.link.clone())).await;

    for (i, (candidate, description)) in relevant.into_iter().enumerate() {
        let (title, text) = match &fetched[i] {
            Some(full) => (
                full.title.clone().unwrap_or_else(|| candidate.title.clone()),
                full.text.clone(),
            ),
            None => (
                candidate.title.clone(),
                description.unwrap_or_else(|| PAYWALL_PLACEHOLDER.to_string()),
            ),
        };
        paper.articles.push(Article {
            title,
            text,
            link: candidate.link,
            published: candidate.published,
        });
    }

    info!(
        source = %source.name,
        count = paper.articles.len(),
        "Collected paywall-fallback articles"
    );
    paper
}
