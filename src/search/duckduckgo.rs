//! DuckDuckGo backend using the HTML endpoint.
//!
//! DuckDuckGo has no free web search API, so results are scraped from
//! `html.duckduckgo.com`. Each result keeps its snippet as content; titles
//! fall back to the domain name. Image search is not supported.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::{SearchRequest, SearchResponse, SearchService};
use crate::error::ProviderError;
use crate::sources::SearchResult;

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Web search through DuckDuckGo's HTML results page.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    base_url: String,
    timeout: Duration,
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SearchService for DuckDuckGoSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
        info!(query = %request.query, "Performing DuckDuckGo search");

        if request.include_images {
            debug!("DuckDuckGo backend does not return images");
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let url = format!(
            "{}/html/?q={}",
            self.base_url,
            urlencoding::encode(&request.query)
        );

        debug!(url = %url, "Fetching search results");

        let response = client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited);
            }
            return Err(ProviderError::Status(status.as_u16(), format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        let results = parse_html(&body, request.max_results);

        if results.is_empty() {
            warn!(query = %request.query, "No search results found");
        } else {
            info!(query = %request.query, count = results.len(), "Search completed");
        }

        Ok(SearchResponse {
            results,
            images: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// Content used when a result carries no snippet.
const NO_SNIPPET: &str = "Search result from DuckDuckGo";

/// Extract results from a DuckDuckGo HTML page.
///
/// Title anchors (`result__a`) and bare URL anchors (`result__url`) open a
/// result; the `result__snippet` that follows becomes its content. Targets
/// come from the encoded `uddg=` redirect parameter when present.
///
/// # Rust Concept: Scoped Non-Send Values
///
/// `scraper::Html` is not `Send`. Keeping it inside this synchronous
/// function guarantees it is dropped before the caller's next `.await`, so
/// the search future itself stays `Send`.
fn parse_html(html: &str, max_results: usize) -> Vec<SearchResult> {
    let Ok(selector) = Selector::parse("a.result__a, a.result__url, .result__snippet") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut results: Vec<SearchResult> = Vec::new();
    let mut seen = HashSet::new();
    // Whether a snippet seen now belongs to the last result pushed
    let mut open_result = false;

    for element in document.select(&selector) {
        let has_class = |name: &str| element.value().classes().any(|c| c == name);
        let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));

        if has_class("result__snippet") {
            if let Some(last) = results.last_mut().filter(|_| open_result) {
                if !text.is_empty() {
                    last.content = text;
                }
            }
            open_result = false;
            continue;
        }

        let Some(url) = element.value().attr("href").and_then(resolve_href) else {
            open_result = false;
            continue;
        };
        if url.contains("duckduckgo.com") {
            open_result = false;
            continue;
        }
        if !seen.insert(url.clone()) {
            // The URL line of a result repeats its title link
            open_result = open_result && results.last().is_some_and(|r| r.url == url);
            continue;
        }
        if results.len() >= max_results {
            open_result = false;
            continue;
        }

        let title = if has_class("result__a") && !text.is_empty() {
            text
        } else {
            extract_domain(&url).unwrap_or_else(|| "Result".to_string())
        };
        results.push(SearchResult::new(title, url, NO_SNIPPET));
        open_result = true;
    }

    results
}

/// Turn a result anchor's `href` into the target URL.
fn resolve_href(href: &str) -> Option<String> {
    if let Some(idx) = href.find("uddg=") {
        let encoded = &href[idx + "uddg=".len()..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        let url = urlencoding::decode(encoded).ok()?.into_owned();
        return url.starts_with("http").then_some(url);
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    href.starts_with("http").then(|| href.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the domain name from a URL.
fn extract_domain(url: &str) -> Option<String> {
    url.split("//")
        .nth(1)?
        .split('/')
        .next()
        .map(|s| s.to_string())
}
