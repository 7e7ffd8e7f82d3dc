//! Tavily Search API backend.
//!
//! One HTTP request per call. Retrying is the caller's decision, so this
//! adapter only classifies failures into typed [`ProviderError`]s.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{SearchRequest, SearchResponse, SearchService};
use crate::error::ProviderError;
use crate::sources::SearchResult;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Default timeout for Tavily API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tavily caps `max_results` at 20.
const MAX_RESULTS_LIMIT: usize = 20;

/// Tavily Search API client.
pub struct TavilySearch {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Request body for Tavily API
#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_raw_content: bool,
    include_images: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
    #[serde(default)]
    images: Vec<TavilyImage>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// Images are plain URLs, or objects when descriptions were requested.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TavilyImage {
    Url(String),
    Described { url: String },
}

impl TavilyImage {
    fn into_url(self) -> String {
        match self {
            TavilyImage::Url(url) | TavilyImage::Described { url } => url,
        }
    }
}

#[async_trait]
impl SearchService for TavilySearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
        info!(query = %request.query, "Performing Tavily search");

        let body = TavilyRequest {
            query: &request.query,
            max_results: request.max_results.clamp(1, MAX_RESULTS_LIMIT),
            search_depth: "basic",
            include_raw_content: false,
            include_images: request.include_images,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => ProviderError::Unauthorized,
                429 => ProviderError::RateLimited,
                code => ProviderError::Status(code, error_text),
            });
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let results: Vec<SearchResult> = parsed
            .results
            .into_iter()
            .map(|r| SearchResult::new(r.title, r.url, r.content))
            .collect();
        let images: Vec<String> = parsed.images.into_iter().map(TavilyImage::into_url).collect();

        debug!(results = results.len(), images = images.len(), "Tavily search completed");

        Ok(SearchResponse { results, images })
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            max_results: 1,
            max_tokens_per_source: 1000,
            include_images: true,
        }
    }

    #[tokio::test]
    async fn test_search_success_with_images() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"query": "caffeine sleep", "include_images": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"title": "Caffeine", "url": "https://a.test", "content": "Delays sleep", "score": 0.9}
                ],
                "images": ["https://img.test/1.png", {"url": "https://img.test/2.png", "description": "d"}]
            })))
            .mount(&server)
            .await;

        let search = TavilySearch::new("test-key").with_base_url(server.uri());
        let response = search.search(&request("caffeine sleep")).await.unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].url, "https://a.test");
        assert_eq!(response.images, vec!["https://img.test/1.png", "https://img.test/2.png"]);
    }

    #[tokio::test]
    async fn test_search_returns_content_unbudgeted() {
        let server = MockServer::start().await;
        let long = "adenosine ".repeat(50);
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"title": "Long", "url": "https://long.test", "content": long.clone()}]
            })))
            .mount(&server)
            .await;

        let search = TavilySearch::new("k").with_base_url(server.uri());
        let mut req = request("x");
        req.max_tokens_per_source = 1;
        let response = search.search(&req).await.unwrap();

        assert_eq!(response.results[0].content, long);
        assert!(response.images.is_empty());
    }

    #[tokio::test]
    async fn test_search_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let search = TavilySearch::new("bad-key").with_base_url(server.uri());
        let err = search.search(&request("x")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized));
    }

    #[tokio::test]
    async fn test_search_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let search = TavilySearch::new("k").with_base_url(server.uri());
        let err = search.search(&request("x")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status(503, _)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_search_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let search = TavilySearch::new("k").with_base_url(server.uri());
        let err = search.search(&request("x")).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
