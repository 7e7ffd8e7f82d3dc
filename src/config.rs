//! # Configuration Module
//!
//! Loads settings from the environment (and a `.env` file, if present),
//! then validates them before a run starts.
//!
//! Two layers:
//! - [`ResearchConfig`]: knobs of the research loop itself
//! - [`Config`]: the loop knobs plus provider settings for the binary

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

// =============================================================================
// RESEARCH LOOP CONFIGURATION
// =============================================================================
/// Parameters of the research loop.
///
/// # Rust Concept: Consuming Builders
///
/// The `with_*` methods take `self` by value and hand it back, so settings
/// chain in one expression: `ResearchConfig::default().with_max_loops(2)`.
/// The original value is moved, never silently shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchConfig {
    /// Number of web-research passes per run
    pub max_loops: usize,

    /// Search results requested per pass
    pub max_results: usize,

    /// Per-source content budget in the summarizer prompt, in approximate tokens
    pub max_tokens_per_source: usize,

    /// Ask the search provider for related images
    pub include_images: bool,

    /// Read model output through the streaming interface
    pub streaming: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_loops: 3,
            max_results: 1,
            max_tokens_per_source: 1000,
            include_images: true,
            streaming: false,
        }
    }
}

impl ResearchConfig {
    pub fn with_max_loops(mut self, max_loops: usize) -> Self {
        self.max_loops = max_loops;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_images(mut self, include_images: bool) -> Self {
        self.include_images = include_images;
        self
    }

    /// Bound handed to the router.
    ///
    /// The router continues while `loop_count <= bound`, so the pass that
    /// brings `loop_count` to `max_loops` is the last one.
    pub fn router_bound(&self) -> usize {
        self.max_loops.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_loops == 0 {
            anyhow::bail!("MAX_RESEARCH_LOOPS must be at least 1");
        }
        if self.max_results == 0 {
            anyhow::bail!("MAX_SEARCH_RESULTS must be at least 1");
        }
        if self.max_tokens_per_source == 0 {
            anyhow::bail!("MAX_TOKENS_PER_SOURCE must be at least 1");
        }
        Ok(())
    }
}

// =============================================================================
// SEARCH PROVIDER SELECTION
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    Tavily,
    DuckDuckGo,
}

impl FromStr for SearchProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" => Ok(SearchProvider::Tavily),
            "duckduckgo" | "ddg" => Ok(SearchProvider::DuckDuckGo),
            other => anyhow::bail!("Unknown search provider '{}' (expected tavily or duckduckgo)", other),
        }
    }
}

// =============================================================================
// APPLICATION CONFIGURATION
// =============================================================================
/// Full configuration of the binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// The Ollama model to use (e.g., "llama3.2", "deepseek-r1")
    pub model: String,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    /// Temperature for LLM responses (0.0 = deterministic)
    pub temperature: f32,

    /// Which search backend to use
    pub search_provider: SearchProvider,

    /// API key for Tavily, required when `search_provider` is Tavily
    pub tavily_api_key: Option<String>,

    /// Research loop parameters
    pub research: ResearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            // Structured JSON answers parse more reliably when sampling is off
            temperature: 0.0,
            search_provider: SearchProvider::DuckDuckGo,
            tavily_api_key: None,
            research: ResearchConfig::default(),
        }
    }
}

/// Parse an optional environment variable, with a readable error on failure.
///
/// # Rust Concept: Generic Bounds
///
/// Any `T: FromStr` works here (`usize`, `f32`, ...). The extra bound on
/// `T::Err` lets `with_context` wrap the parse error into `anyhow::Error`.
fn env_parse<T>(name: &str, hint: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(val) => {
            let parsed = val
                .trim()
                .parse()
                .with_context(|| format!("{} must be {}", name, hint))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

fn parse_bool(name: &str, val: &str) -> Result<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be a boolean (true/false), got: {}", name, val),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(val) = env::var("OLLAMA_MODEL") {
            config.model = val;
        }

        if let Ok(val) = env::var("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Some(val) = env_parse("TEMPERATURE", "a valid floating-point number (e.g., 0.7)")? {
            config.temperature = val;
        }

        config.tavily_api_key = env::var("TAVILY_API_KEY").ok().filter(|k| !k.trim().is_empty());
        if config.tavily_api_key.is_some() {
            config.search_provider = SearchProvider::Tavily;
        }
        if let Ok(val) = env::var("SEARCH_PROVIDER") {
            config.search_provider = val.parse()?;
        }

        if let Some(val) = env_parse("MAX_RESEARCH_LOOPS", "a positive integer")? {
            config.research.max_loops = val;
        }
        if let Some(val) = env_parse("MAX_SEARCH_RESULTS", "a positive integer")? {
            config.research.max_results = val;
        }
        if let Some(val) = env_parse("MAX_TOKENS_PER_SOURCE", "a positive integer")? {
            config.research.max_tokens_per_source = val;
        }
        if let Ok(val) = env::var("INCLUDE_IMAGES") {
            config.research.include_images = parse_bool("INCLUDE_IMAGES", &val)?;
        }
        if let Ok(val) = env::var("STREAM_RESPONSES") {
            config.research.streaming = parse_bool("STREAM_RESPONSES", &val)?;
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.model.is_empty() {
            anyhow::bail!("OLLAMA_MODEL cannot be empty");
        }

        if self.search_provider == SearchProvider::Tavily && self.tavily_api_key.is_none() {
            anyhow::bail!("TAVILY_API_KEY must be set to use the Tavily search provider");
        }

        self.research.validate()
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
/// # Rust Concept: Unit Tests
///
/// `#[cfg(test)]` compiles this module only for `cargo test`, and
/// `use super::*` brings private helpers such as `parse_bool` into scope.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.ollama_host, "http://localhost:11434");
        assert_eq!(config.search_provider, SearchProvider::DuckDuckGo);
        assert_eq!(config.research.max_loops, 3);
        assert_eq!(config.research.max_results, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_router_bound() {
        assert_eq!(ResearchConfig::default().with_max_loops(2).router_bound(), 1);
        assert_eq!(ResearchConfig::default().with_max_loops(3).router_bound(), 2);
        assert_eq!(ResearchConfig::default().with_max_loops(1).router_bound(), 0);
    }

    #[test]
    fn test_config_validation_invalid_temperature() {
        let mut config = Config::default();
        config.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_loops() {
        let mut config = Config::default();
        config.research.max_loops = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tavily_requires_key() {
        let mut config = Config::default();
        config.search_provider = SearchProvider::Tavily;
        assert!(config.validate().is_err());
        config.tavily_api_key = Some("tvly-key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_search_provider_parse() {
        assert_eq!("Tavily".parse::<SearchProvider>().unwrap(), SearchProvider::Tavily);
        assert_eq!("ddg".parse::<SearchProvider>().unwrap(), SearchProvider::DuckDuckGo);
        assert!("bing".parse::<SearchProvider>().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
