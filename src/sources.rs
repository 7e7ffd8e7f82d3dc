//! # Source Formatter
//!
//! Renders raw search results two ways:
//! - a token-bounded text block that is fed back into the summarizer prompt
//! - a compact citation list that only ever appears in the final report
//!
//! Both deduplicate by URL, keeping the first occurrence in result order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Rough characters-per-token ratio used to turn a token budget into a
/// character budget.
pub const CHARS_PER_TOKEN: usize = 4;

const TRUNCATION_MARKER: &str = "... [truncated]";

/// A single search result as returned by a search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the page
    pub title: String,

    /// The URL of the page, used as its identity
    pub url: String,

    /// Extracted content or snippet
    pub content: String,
}

impl SearchResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}

fn unique_by_url(results: &[SearchResult]) -> Vec<&SearchResult> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter(|r| seen.insert(r.url.as_str()))
        .collect()
}

/// Cut `content` to roughly `max_tokens` tokens on a char boundary.
fn truncate_to_tokens(content: &str, max_tokens: usize) -> String {
    let char_limit = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    match content.char_indices().nth(char_limit) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

/// Render deduplicated results as a prompt block.
///
/// Output is a pure function of the input order, so repeated calls on the
/// same results produce identical text.
pub fn format_for_prompt(results: &[SearchResult], max_tokens_per_source: usize) -> String {
    let unique = unique_by_url(results);
    if unique.is_empty() {
        return String::new();
    }

    let mut text = String::from("Sources:\n\n");
    for source in unique {
        text.push_str(&format!("Source: {}\n===\n", source.title));
        text.push_str(&format!("URL: {}\n===\n", source.url));
        text.push_str(&format!(
            "Most relevant content from source: {}\n===\n\n",
            truncate_to_tokens(&source.content, max_tokens_per_source)
        ));
    }

    text.trim_end().to_string()
}

/// One `* title : url` line per unique source.
pub fn format_citations(results: &[SearchResult]) -> String {
    unique_by_url(results)
        .into_iter()
        .map(|r| format!("* {} : {}", r.title, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SearchResult> {
        vec![
            SearchResult::new("Sleep Foundation", "https://sleep.org/caffeine", "Caffeine delays sleep onset."),
            SearchResult::new("NIH", "https://nih.gov/adenosine", "Adenosine receptors are blocked."),
            SearchResult::new("Sleep Foundation (dup)", "https://sleep.org/caffeine", "Duplicate body."),
        ]
    }

    #[test]
    fn test_format_for_prompt_dedups_and_keeps_order() {
        let text = format_for_prompt(&sample(), 1000);
        assert!(text.starts_with("Sources:"));
        assert_eq!(text.matches("URL: https://sleep.org/caffeine").count(), 1);
        assert!(!text.contains("Duplicate body"));
        let first = text.find("Sleep Foundation").unwrap();
        let second = text.find("NIH").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_format_for_prompt_is_deterministic() {
        let results = sample();
        assert_eq!(format_for_prompt(&results, 50), format_for_prompt(&results, 50));
    }

    #[test]
    fn test_format_for_prompt_truncates() {
        let long = "é".repeat(100);
        let results = vec![SearchResult::new("Long", "https://x.test", long)];
        let text = format_for_prompt(&results, 5);
        assert!(text.contains(&format!("{}{}", "é".repeat(20), TRUNCATION_MARKER)));
        assert!(!text.contains(&"é".repeat(21)));
    }

    #[test]
    fn test_format_for_prompt_empty() {
        assert_eq!(format_for_prompt(&[], 100), "");
    }

    #[test]
    fn test_format_citations() {
        let text = format_citations(&sample());
        assert_eq!(
            text,
            "* Sleep Foundation : https://sleep.org/caffeine\n* NIH : https://nih.gov/adenosine"
        );
    }
}
