//! # Response Parser
//!
//! Reasoning models wrap their deliberation in `<think>...</think>` before the
//! substantive answer. This module separates the two and decodes JSON answers
//! into the fields a stage asks for.

use serde_json::{Map, Value};

use crate::error::ParseError;

pub const REASONING_OPEN: &str = "<think>";
pub const REASONING_CLOSE: &str = "</think>";

/// Split `text` into `(reasoning, remainder)`.
///
/// Every `<think>...</think>` segment is removed from the text. The extracted
/// segments are trimmed and joined by a blank line. Text without a complete
/// delimiter pair is returned unchanged with empty reasoning.
pub fn split_reasoning(text: &str) -> (String, String) {
    let mut remainder = text.to_string();
    let mut segments: Vec<String> = Vec::new();

    while let Some((start, end)) = next_segment(&remainder) {
        let inner = &remainder[start + REASONING_OPEN.len()..end];
        let inner = inner.trim();
        if !inner.is_empty() {
            segments.push(inner.to_string());
        }
        remainder.replace_range(start..end + REASONING_CLOSE.len(), "");
    }

    if segments.is_empty() && remainder.len() == text.len() {
        return (String::new(), text.to_string());
    }

    (segments.join("\n\n"), remainder.trim().to_string())
}

/// Locate the next open marker with a close marker after it.
fn next_segment(text: &str) -> Option<(usize, usize)> {
    let start = text.find(REASONING_OPEN)?;
    let search_from = start + REASONING_OPEN.len();
    let end = text[search_from..].find(REASONING_CLOSE)? + search_from;
    Some((start, end))
}

/// Decode `text` as a JSON object holding every field in `required`.
///
/// A surrounding Markdown code fence (```json ... ```) is tolerated. A field
/// that is absent or `null` counts as missing.
pub fn parse_structured(text: &str, required: &[&str]) -> Result<Map<String, Value>, ParseError> {
    let body = strip_code_fence(text.trim());

    let value: Value =
        serde_json::from_str(body).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(ParseError::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    };

    for field in required {
        match map.get(*field) {
            None | Some(Value::Null) => return Err(ParseError::MissingField(field.to_string())),
            Some(_) => {}
        }
    }

    Ok(map)
}

/// Text of a decoded field: strings as-is, other scalars rendered as JSON.
pub fn field_text(map: &Map<String, Value>, field: &str) -> String {
    match map.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Picks reasoning text out of a model stream as it arrives.
///
/// Markers are recognised only when a single chunk carries them whole.
#[derive(Debug, Default)]
pub struct ReasoningFilter {
    inside: bool,
}

impl ReasoningFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the stream is currently inside a reasoning segment.
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Feed one chunk; returns the part of it that is reasoning text.
    pub fn feed(&mut self, chunk: &str) -> String {
        let mut reasoning = String::new();
        let mut rest = chunk;
        loop {
            if self.inside {
                match rest.find(REASONING_CLOSE) {
                    Some(end) => {
                        reasoning.push_str(&rest[..end]);
                        rest = &rest[end + REASONING_CLOSE.len()..];
                        self.inside = false;
                    }
                    None => {
                        reasoning.push_str(rest);
                        return reasoning;
                    }
                }
            } else {
                match rest.find(REASONING_OPEN) {
                    Some(start) => {
                        rest = &rest[start + REASONING_OPEN.len()..];
                        self.inside = true;
                    }
                    None => return reasoning,
                }
            }
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_single_segment() {
        let (reasoning, rest) = split_reasoning("<think> weigh options </think>\n{\"a\": 1}");
        assert_eq!(reasoning, "weigh options");
        assert_eq!(rest, "{\"a\": 1}");
    }

    #[test]
    fn test_split_multiple_segments() {
        let text = "<think>first</think>Answer part<think>\nsecond\n</think> end";
        let (reasoning, rest) = split_reasoning(text);
        assert_eq!(reasoning, "first\n\nsecond");
        assert_eq!(rest, "Answer part end");
        assert!(!rest.contains(REASONING_OPEN));
        assert!(!rest.contains(REASONING_CLOSE));
    }

    #[test]
    fn test_split_without_delimiters_is_identity() {
        for text in ["plain answer", "  padded  ", "", "only <think> open", "</think> close first"] {
            assert_eq!(split_reasoning(text), (String::new(), text.to_string()));
        }
    }

    #[test]
    fn test_split_is_idempotent() {
        let texts = [
            "<think>a</think>b",
            "x<think>1</think>y<think>2</think>z",
            "<think></think>",
            "no markers at all",
            "<think>unbalanced",
        ];
        for text in texts {
            let (_, once) = split_reasoning(text);
            let (reasoning, twice) = split_reasoning(&once);
            assert_eq!(once, twice, "not idempotent for {text:?}");
            assert!(reasoning.is_empty());
        }
    }

    #[test]
    fn test_parse_structured_ok() {
        let map = parse_structured(r#"{"query": "rust async", "rationale": "recent"}"#, &["query", "rationale"])
            .unwrap();
        assert_eq!(field_text(&map, "query"), "rust async");
        assert_eq!(field_text(&map, "rationale"), "recent");
    }

    #[test]
    fn test_parse_structured_code_fence() {
        let text = "```json\n{\"follow_up_query\": \"q\", \"knowledge_gap\": \"g\"}\n```";
        let map = parse_structured(text, &["follow_up_query", "knowledge_gap"]).unwrap();
        assert_eq!(field_text(&map, "follow_up_query"), "q");
    }

    #[test]
    fn test_parse_structured_missing_field() {
        let err = parse_structured(r#"{"query": "x", "rationale": null}"#, &["query", "rationale"]).unwrap_err();
        assert_eq!(err, ParseError::MissingField("rationale".to_string()));
    }

    #[test]
    fn test_parse_structured_malformed() {
        assert!(matches!(
            parse_structured("not json at all", &["query"]),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_structured("[1, 2]", &[]),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_field_text_non_string() {
        let map = parse_structured(r#"{"n": 3}"#, &["n"]).unwrap();
        assert_eq!(field_text(&map, "n"), "3");
        assert_eq!(field_text(&map, "absent"), "");
    }

    #[test]
    fn test_reasoning_filter_across_chunks() {
        let mut filter = ReasoningFilter::new();
        assert_eq!(filter.feed("<think>caffeine"), "caffeine");
        assert!(filter.is_inside());
        assert_eq!(filter.feed(" blocks adenosine"), " blocks adenosine");
        assert_eq!(filter.feed("</think>{\"query\""), "");
        assert!(!filter.is_inside());
        assert_eq!(filter.feed(": \"x\"}"), "");
    }

    #[test]
    fn test_reasoning_filter_whole_segment_in_one_chunk() {
        let mut filter = ReasoningFilter::new();
        assert_eq!(filter.feed("a<think>b</think>c<think>d</think>e"), "bd");
        assert_eq!(filter.feed("plain answer"), "");
    }
}
