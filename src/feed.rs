//! Feed reader: fetches an RSS 2.0 or Atom feed and turns it into a
//! bounded list of candidate entries.
//!
//! Entries missing a title, a link, or a parseable publication timestamp
//! are silently dropped; they are not relevance candidates. A malformed or
//! empty feed yields an empty list, never an error; the caller logs and
//! moves on to other sources.

use chrono::DateTime;
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::models::Candidate;
use crate::runner::ScraperContext;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
}

// Atom titles may carry a `type` attribute, so a bare String won't do.
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Normalize a feed timestamp (RFC 2822 in RSS, RFC 3339 in Atom) to an
/// RFC 3339 string. Unparseable timestamps count as missing.
fn parse_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.to_rfc3339())
}

fn candidate_from_rss(item: Item) -> Option<Candidate> {
    let title = item.title?.trim().to_string();
    if title.is_empty() {
        return None;
    }
    Some(Candidate {
        title,
        link: item.link?.trim().to_string(),
        published: parse_timestamp(item.pub_date?.trim())?,
    })
}

fn candidate_from_atom(entry: AtomEntry) -> Option<Candidate> {
    let title = entry.title?.value?.trim().to_string();
    if title.is_empty() {
        return None;
    }
    let link = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .and_then(|l| l.href.clone())?;
    let published = entry.published.or(entry.updated)?;
    Some(Candidate {
        title,
        link,
        published: parse_timestamp(published.trim())?,
    })
}

/// Parse feed XML into at most `limit` candidates, in document order.
///
/// The limit applies to the raw entry list before the missing-field filter,
/// matching how a bounded read of a live feed behaves: later entries are
/// never pulled in to backfill dropped ones.
pub fn parse_feed(xml: &str, limit: usize) -> Vec<Candidate> {
    if let Ok(rss) = from_str::<Rss>(xml) {
        return rss
            .channel
            .items
            .into_iter()
            .take(limit)
            .filter_map(candidate_from_rss)
            .collect();
    }

    if let Ok(atom) = from_str::<AtomFeed>(xml) {
        return atom
            .entries
            .into_iter()
            .take(limit)
            .filter_map(candidate_from_atom)
            .collect();
    }

    Vec::new()
}

/// Fetch and parse a feed URL into candidates.
///
/// Feed URLs must start with the `http` scheme prefix; anything else is an
/// invalid-source condition and returns empty without a network call.
#[instrument(level = "info", skip(ctx))]
pub async fn read_feed<C>(ctx: &ScraperContext<C>, feed_url: &str, limit: usize) -> Vec<Candidate> {
    if !feed_url.starts_with("http") {
        warn!(feed_url, "Invalid feed URL; skipping source");
        return Vec::new();
    }

    let body = {
        let _permit = ctx.outbound_permit().await;
        match ctx.client.get(feed_url).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => match resp.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(feed_url, error = %e, "Failed reading feed body");
                        return Vec::new();
                    }
                },
                Err(e) => {
                    warn!(feed_url, error = %e, "Feed request returned error status");
                    return Vec::new();
                }
            },
            Err(e) => {
                warn!(feed_url, error = %e, "Feed request failed");
                return Vec::new();
            }
        }
    };

    let candidates = parse_feed(&body, limit);
    debug!(feed_url, count = candidates.len(), "Parsed feed candidates");
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example Finance</title>
    <item>
      <title>Markets rally on rate cut hopes</title>
      <link>https://example.com/rally</link>
      <pubDate>Sat, 01 Mar 2025 12:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Untimestamped entry</title>
      <link>https://example.com/no-date</link>
    </item>
    <item>
      <title>Crypto slides after hearing</title>
      <link>https://example.com/crypto</link>
      <pubDate>Sat, 01 Mar 2025 13:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Oil steady ahead of OPEC meeting</title>
      <link>https://example.com/oil</link>
      <pubDate>Sat, 01 Mar 2025 14:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM_FIXTURE: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <entry>
    <title type="text">Banks report record earnings</title>
    <link rel="alternate" href="https://example.com/banks"/>
    <published>2025-03-01T09:00:00Z</published>
  </entry>
  <entry>
    <title>Entry without link</title>
    <published>2025-03-01T10:00:00Z</published>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_drops_entries_missing_fields() {
        let candidates = parse_feed(RSS_FIXTURE, 10);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].title, "Markets rally on rate cut hopes");
        assert_eq!(candidates[0].link, "https://example.com/rally");
        assert_eq!(candidates[0].published, "2025-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_parse_rss_preserves_document_order() {
        let candidates = parse_feed(RSS_FIXTURE, 10);
        let titles: Vec<&str> = candidates.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Markets rally on rate cut hopes",
                "Crypto slides after hearing",
                "Oil steady ahead of OPEC meeting",
            ]
        );
    }

    #[test]
    fn test_limit_applies_before_field_filter() {
        // First two raw items: one valid, one missing pubDate.
        let candidates = parse_feed(RSS_FIXTURE, 2);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Markets rally on rate cut hopes");
    }

    #[test]
    fn test_parse_atom_feed() {
        let candidates = parse_feed(ATOM_FIXTURE, 10);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Banks report record earnings");
        assert_eq!(candidates[0].link, "https://example.com/banks");
        assert_eq!(candidates[0].published, "2025-03-01T09:00:00+00:00");
    }

    #[test]
    fn test_malformed_feed_yields_empty() {
        assert!(parse_feed("this is not xml", 10).is_empty());
        assert!(parse_feed("<html><body>404</body></html>", 10).is_empty());
    }

    #[test]
    fn test_empty_channel_yields_empty() {
        let xml = r#"<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
        assert!(parse_feed(xml, 10).is_empty());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp("Sat, 01 Mar 2025 12:00:00 +0000"),
            Some("2025-03-01T12:00:00+00:00".to_string())
        );
        assert_eq!(
            parse_timestamp("2025-03-01T12:00:00Z"),
            Some("2025-03-01T12:00:00+00:00".to_string())
        );
        assert_eq!(parse_timestamp("yesterday-ish"), None);
    }
}
