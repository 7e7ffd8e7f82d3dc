//! # Stage Functions
//!
//! The five steps of the research loop. Each reads the current state and
//! returns a [`ResearchUpdate`]; none of them mutates the state directly.
//!
//! Failure policy:
//! - generate-query: unparsable or empty output is fatal (nothing to search)
//! - web-research: one retry with identical parameters, then fatal
//! - summarize: any text is accepted; only a failed model call is fatal
//! - reflect: unparsable output falls back to a generic follow-up query
//! - finalize: infallible

use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::ResearchConfig;
use crate::error::{ProviderError, StageError};
use crate::events::{EventSink, Stage};
use crate::llm::{LanguageModel, Message};
use crate::parser::{field_text, parse_structured, split_reasoning, ReasoningFilter};
use crate::prompts::ResearchPrompts;
use crate::search::{SearchRequest, SearchResponse, SearchService};
use crate::sources::{format_citations, format_for_prompt};
use crate::state::{ResearchState, ResearchUpdate};

/// Attempts per web-research stage: the first call plus one retry.
const SEARCH_ATTEMPTS: usize = 2;

/// Collaborators every stage can reach.
pub struct StageContext<'a> {
    pub model: &'a dyn LanguageModel,
    pub search: &'a dyn SearchService,
    pub config: &'a ResearchConfig,
    pub events: &'a EventSink,
}

impl StageContext<'_> {
    /// Call the model once and split its reasoning from the answer.
    ///
    /// In streaming mode each chunk's reasoning text is forwarded as a
    /// `thinking` event tagged with `stage` while the answer accumulates.
    async fn ask(&self, stage: Stage, messages: &[Message]) -> Result<(String, String), ProviderError> {
        let raw = if self.config.streaming {
            let mut stream = self.model.stream(messages).await?;
            let mut filter = ReasoningFilter::new();
            let mut raw = String::new();
            let mut chunks = 0usize;
            while let Some(chunk) = stream.next_chunk().await {
                let chunk = chunk?;
                let thought = filter.feed(&chunk);
                if !thought.is_empty() {
                    self.events
                        .emit(Stage::Thinking, json!({"stage": stage, "chunk": thought}));
                }
                raw.push_str(&chunk);
                chunks += 1;
            }
            debug!(stage = %stage, chunks, "Model stream drained");
            raw
        } else {
            self.model.invoke(messages).await?
        };
        debug!(model = self.model.name(), bytes = raw.len(), "Model responded");
        Ok(split_reasoning(&raw))
    }
}

// =============================================================================
// 1. GENERATE QUERY
// =============================================================================
pub async fn generate_query(
    ctx: &StageContext<'_>,
    state: &ResearchState,
) -> Result<ResearchUpdate, StageError> {
    info!(topic = %state.topic, "Generating search query");

    let messages = ResearchPrompts::query_messages(&state.topic);
    let (reasoning, answer) = ctx.ask(Stage::GenerateQuery, &messages).await?;

    let fields = parse_structured(&answer, &["query", "rationale"])?;
    let query = field_text(&fields, "query");
    if query.is_empty() {
        return Err(StageError::EmptyQuery);
    }
    let rationale = field_text(&fields, "rationale");

    ctx.events.emit(
        Stage::GenerateQuery,
        json!({"query": query, "rationale": rationale, "reasoning": reasoning}),
    );

    Ok(ResearchUpdate::query_with_rationale(query, rationale))
}

// =============================================================================
// 2. WEB RESEARCH
// =============================================================================
pub async fn web_research(
    ctx: &StageContext<'_>,
    state: &ResearchState,
) -> Result<ResearchUpdate, StageError> {
    let request = SearchRequest {
        query: state.query.clone(),
        max_results: ctx.config.max_results,
        max_tokens_per_source: ctx.config.max_tokens_per_source,
        include_images: ctx.config.include_images,
    };

    let response = search_with_retry(ctx.search, &request).await?;

    let prompt_block = format_for_prompt(&response.results, request.max_tokens_per_source);
    let citations = format_citations(&response.results);
    let loop_count = state.loop_count + 1;

    info!(
        query = %request.query,
        results = response.results.len(),
        images = response.images.len(),
        loop_count,
        "Web research pass complete"
    );

    ctx.events.emit(
        Stage::WebResearch,
        json!({
            "query": request.query,
            "sources": response.results,
            "images": response.images,
            "loop_count": loop_count,
        }),
    );

    Ok(ResearchUpdate::research_pass(prompt_block, citations, response.images))
}

async fn search_with_retry(
    search: &dyn SearchService,
    request: &SearchRequest,
) -> Result<SearchResponse, ProviderError> {
    let mut attempt = 1;
    loop {
        match search.search(request).await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < SEARCH_ATTEMPTS => {
                warn!(provider = search.name(), attempt, error = %e, "Search failed, retrying once");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// =============================================================================
// 3. SUMMARIZE
// =============================================================================
pub async fn summarize(
    ctx: &StageContext<'_>,
    state: &ResearchState,
) -> Result<ResearchUpdate, StageError> {
    let latest = state.latest_research().unwrap_or_default();
    let messages = ResearchPrompts::summary_messages(&state.topic, &state.summary, latest);

    let (reasoning, summary) = ctx.ask(Stage::Summarize, &messages).await?;

    info!(
        updating = !state.summary.is_empty(),
        chars = summary.len(),
        "Summary written"
    );

    ctx.events.emit(
        Stage::Summarize,
        json!({"summary": summary, "reasoning": reasoning}),
    );

    Ok(ResearchUpdate::summary(summary))
}

// =============================================================================
// 4. REFLECT
// =============================================================================
pub fn fallback_query(topic: &str) -> String {
    format!("Tell me more about {}", topic)
}

pub async fn reflect(
    ctx: &StageContext<'_>,
    state: &ResearchState,
) -> Result<ResearchUpdate, StageError> {
    let messages = ResearchPrompts::reflection_messages(&state.topic, &state.summary);
    let (reasoning, answer) = ctx.ask(Stage::Reflection, &messages).await?;

    let parsed = parse_structured(&answer, &["follow_up_query", "knowledge_gap"]).map(|fields| {
        (
            field_text(&fields, "follow_up_query"),
            field_text(&fields, "knowledge_gap"),
        )
    });

    let (query, knowledge_gap, fallback) = match parsed {
        Ok((query, gap)) if !query.is_empty() => (query, gap, false),
        Ok(_) => {
            warn!("Reflection returned an empty follow-up query, using fallback");
            (fallback_query(&state.topic), String::new(), true)
        }
        Err(e) => {
            warn!(error = %e, "Reflection output unparsable, using fallback");
            (fallback_query(&state.topic), String::new(), true)
        }
    };

    ctx.events.emit(
        Stage::Reflection,
        json!({
            "query": query,
            "knowledge_gap": knowledge_gap,
            "reasoning": reasoning,
            "fallback": fallback,
        }),
    );

    Ok(ResearchUpdate::reflection(query, knowledge_gap))
}

// =============================================================================
// 5. FINALIZE
// =============================================================================
/// Optional image header for the final report.
pub fn image_section(images: &[String]) -> String {
    match images {
        [] => String::new(),
        [only] => format!(
            r#"<div class="flex justify-center mb-6">
  <div class="w-full max-w-lg">
    <img src="{only}" alt="Research image" class="w-full h-auto rounded-lg shadow-md">
  </div>
</div>
"#
        ),
        [first, second, ..] => format!(
            r#"<div class="flex flex-col md:flex-row gap-4 mb-6">
  <div class="w-full md:w-1/2">
    <img src="{first}" alt="Research image 1" class="w-full h-auto rounded-lg shadow-md">
  </div>
  <div class="w-full md:w-1/2">
    <img src="{second}" alt="Research image 2" class="w-full h-auto rounded-lg shadow-md">
  </div>
</div>
"#
        ),
    }
}

/// Assemble images, summary and sources into the final report.
pub fn finalize(ctx: &StageContext<'_>, state: &ResearchState) -> ResearchUpdate {
    let mut report = image_section(&state.images);
    report.push_str(&format!("## Summary\n{}\n\n### Sources:\n", state.summary));
    for source in &state.sources_gathered {
        report.push_str(source);
        report.push('\n');
    }

    info!(
        images = state.images.len().min(2),
        source_blocks = state.sources_gathered.len(),
        "Final report assembled"
    );

    ctx.events.emit(Stage::Finalize, json!({"summary": report}));

    ResearchUpdate::summary(report)
}
