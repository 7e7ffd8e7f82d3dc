//! # Error Module
//!
//! Typed errors for the research loop, built with `thiserror`.
//!
//! The taxonomy has three layers:
//! - [`ParseError`]: the model produced malformed or incomplete structured output
//! - [`ProviderError`]: a call to the model or search provider failed
//! - [`RunError`]: a run ended without reaching the final report
//!
//! Stage functions return [`StageError`]; the orchestrator wraps it into a
//! [`RunError`] tagged with the stage that failed.

use thiserror::Error;

use crate::events::Stage;

// =============================================================================
// PARSE ERRORS
// =============================================================================
/// Structured model output could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed structured output: {0}")]
    Malformed(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

// =============================================================================
// PROVIDER ERRORS
// =============================================================================
/// Failure talking to the language model or the search provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized - check API key")]
    Unauthorized,

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("HTTP error ({0}): {1}")]
    Status(u16, String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Model error: {0}")]
    Model(String),
}

impl ProviderError {
    /// Whether a repeat of the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout
            | ProviderError::Connection(_)
            | ProviderError::Network(_)
            | ProviderError::RateLimited => true,
            ProviderError::Status(code, _) => *code >= 500,
            ProviderError::Unauthorized
            | ProviderError::InvalidResponse(_)
            | ProviderError::Model(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::Connection(e.to_string())
        } else if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

// =============================================================================
// STAGE AND RUN ERRORS
// =============================================================================
/// A fatal failure inside a single stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("model returned an empty search query")]
    EmptyQuery,
}

/// Terminal failure of a research run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("run cancelled: subscriber disconnected")]
    Cancelled,
}

impl RunError {
    pub fn stage(stage: Stage, source: impl Into<StageError>) -> Self {
        RunError::Stage {
            stage,
            source: source.into(),
        }
    }

    /// The stage that failed, if the run failed inside a stage.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            RunError::Stage { stage, .. } => Some(*stage),
            RunError::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Status(503, String::new()).is_retryable());
        assert!(!ProviderError::Status(400, String::new()).is_retryable());
        assert!(!ProviderError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_run_error_display_names_stage() {
        let err = RunError::stage(
            Stage::GenerateQuery,
            ParseError::MissingField("query".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("generate_query"));
        assert!(msg.contains("query"));
        assert_eq!(err.failed_stage(), Some(Stage::GenerateQuery));
    }

    #[test]
    fn test_stage_error_from_parse() {
        let err: StageError = ParseError::Malformed("eof".to_string()).into();
        assert!(matches!(err, StageError::Parse(_)));
    }
}
