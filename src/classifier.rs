//! Batched relevance classification through the Anthropic Messages API.
//!
//! One external request per batch: every candidate title becomes a YES/NO
//! prompt, the prompts are concatenated, and the response is parsed back
//! into one decision per title in input order. Any transport error or a
//! response whose line count does not match the title count fails the whole
//! batch closed, marking every title irrelevant. Admitting content on an
//! ambiguous signal is worse than dropping a batch for one run, so there is
//! deliberately no retry here; retries belong to the article fetcher.

use std::error::Error;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::utils::truncate_for_log;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

/// A batch relevance decision over candidate titles.
///
/// Implementations return exactly one boolean per input title, in input
/// order, or an error covering the whole batch. The trait seam exists so
/// the pipeline can be exercised against a canned classifier in tests.
pub trait Classifier {
    async fn classify(&self, titles: &[String]) -> Result<Vec<bool>, Box<dyn Error>>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Production classifier backed by Claude.
pub struct ClaudeClassifier {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeClassifier {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Build the single concatenated prompt for a batch of titles.
pub fn build_prompt(titles: &[String]) -> String {
    titles
        .iter()
        .map(|title| {
            format!(
                "Title: {title}\n\nIs this article about finance, markets, economy, stocks, \
                 bonds, crypto, or general financial news? Respond only with 'YES' or 'NO'."
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse a classification response into per-title decisions.
///
/// One non-empty line per title, `YES` meaning relevant; any other token is
/// a NO. A line count that differs from `expected` means the model lost
/// alignment with the batch and the response cannot be trusted.
pub fn parse_decisions(response: &str, expected: usize) -> Result<Vec<bool>, Box<dyn Error>> {
    let decisions: Vec<bool> = response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.eq_ignore_ascii_case("yes"))
        .collect();

    if decisions.len() != expected {
        return Err(format!(
            "classification returned {} decisions for {} titles",
            decisions.len(),
            expected
        )
        .into());
    }
    Ok(decisions)
}

impl Classifier for ClaudeClassifier {
    #[instrument(level = "info", skip_all, fields(batch = titles.len()))]
    async fn classify(&self, titles: &[String]) -> Result<Vec<bool>, Box<dyn Error>> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_prompt(titles);
        let request = MessagesRequest {
            model: &self.model,
            // Room for one short token per line.
            max_tokens: (titles.len() as u32) * 8,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        let t0 = Instant::now();
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<MessagesResponse>()
            .await?;

        let text = response
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default();

        let decisions = parse_decisions(&text, titles.len());
        if let Err(ref e) = decisions {
            warn!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                response_preview = %truncate_for_log(&text, 200),
                error = %e,
                "Malformed classification response"
            );
        }
        decisions
    }
}
