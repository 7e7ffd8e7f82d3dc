//! # Deep Research Loop
//!
//! An iterative research workflow: given a topic, repeatedly formulate a
//! search query, retrieve sources, fold them into a running summary, reflect
//! on what is missing, and decide whether to search again or write the final
//! report.
//!
//! ```ignore
//! use std::sync::Arc;
//! use deep_research::{Orchestrator, OllamaModel, DuckDuckGoSearch, ResearchConfig};
//!
//! let model = Arc::new(OllamaModel::new("http://localhost:11434", "deepseek-r1", 0.0));
//! let search = Arc::new(DuckDuckGoSearch::new());
//! let orchestrator = Orchestrator::new(model, search, ResearchConfig::default());
//!
//! let mut run = orchestrator.start("effect of caffeine on sleep", "run-1");
//! while let Some(event) = run.events.recv().await {
//!     println!("{}: {}", event.stage, event.payload);
//! }
//! let state = run.outcome.await??;
//! println!("{}", state.summary);
//! ```
//!
//! ## Module Structure
//!
//! - `parser` - reasoning-segment stripping and structured answer decoding
//! - `sources` - prompt and citation rendering of search results
//! - `state` - the per-run research state and its partial updates
//! - `stages` - the five stage functions
//! - `router` - the loop-or-finalize decision
//! - `orchestrator` - the run loop and event emission
//! - `llm`, `search` - provider traits and their adapters

pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod router;
pub mod search;
pub mod sources;
pub mod stages;
pub mod state;

pub use config::{Config, ResearchConfig, SearchProvider};
pub use error::{ParseError, ProviderError, RunError, StageError};
pub use events::{EventSink, ProgressEvent, Stage};
pub use llm::{LanguageModel, Message, OllamaModel, Role, TextStream};
pub use orchestrator::{Node, Orchestrator, RunHandle};
pub use router::{route, Route};
pub use search::{DuckDuckGoSearch, SearchRequest, SearchResponse, SearchService, TavilySearch};
pub use sources::SearchResult;
pub use state::{ResearchState, ResearchUpdate};
