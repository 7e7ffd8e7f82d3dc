//! # Search Module
//!
//! The [`SearchService`] trait turns a query into ranked source records and,
//! when the provider supports it, related image URLs.
//!
//! Two providers ship with the crate:
//! - [`TavilySearch`]: Tavily Search API, needs `TAVILY_API_KEY`, returns images
//! - [`DuckDuckGoSearch`]: free DuckDuckGo HTML endpoint, no images

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::sources::SearchResult;

pub mod duckduckgo;
pub mod tavily;

pub use duckduckgo::DuckDuckGoSearch;
pub use tavily::TavilySearch;

/// Parameters of one search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    /// Per-source content budget, in approximate tokens.
    ///
    /// Neither provider accepts a content-length limit, so adapters return
    /// content as received and the budget is applied when results are
    /// rendered into the summarizer prompt.
    pub max_tokens_per_source: usize,
    pub include_images: bool,
}

/// Results of one search call, in provider rank order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A web search backend.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
