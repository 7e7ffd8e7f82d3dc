//! Research state and the partial updates stages produce.
//!
//! A stage never mutates the state it is handed. It returns a
//! [`ResearchUpdate`] and the orchestrator merges it with
//! [`ResearchState::apply_update`]:
//! - `Option` fields replace the current value when `Some`
//! - `Vec` fields are appended in order
//! - `loop_increment` bumps `loop_count` by exactly one

use serde::{Deserialize, Serialize};

/// The workflow record threaded through every stage of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    /// Opaque identifier of the run this state belongs to
    pub run_id: String,

    /// Research topic, fixed at run start
    pub topic: String,

    /// Current search query
    pub query: String,

    /// Justification for the current query
    pub rationale: String,

    /// One prompt-oriented block per completed web-research stage
    pub research_results: Vec<String>,

    /// One citation block per completed web-research stage
    pub sources_gathered: Vec<String>,

    /// Number of completed web-research stages
    pub loop_count: usize,

    /// Running synthesis, replaced by summarize and finalize
    pub summary: String,

    /// Latest knowledge gap identified by reflection
    pub knowledge_gap: String,

    /// Image URLs discovered by this run's searches
    pub images: Vec<String>,
}

impl ResearchState {
    /// Fresh state for a run: only the topic and run id are set.
    pub fn new(topic: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            topic: topic.into(),
            ..Default::default()
        }
    }

    /// Latest prompt-oriented research block, if any.
    pub fn latest_research(&self) -> Option<&str> {
        self.research_results.last().map(String::as_str)
    }

    /// Merge an update into a copy of this state.
    pub fn apply_update(&self, update: ResearchUpdate) -> Self {
        let mut new = self.clone();

        if let Some(query) = update.query {
            new.query = query;
        }
        if let Some(rationale) = update.rationale {
            new.rationale = rationale;
        }
        if let Some(summary) = update.summary {
            new.summary = summary;
        }
        if let Some(gap) = update.knowledge_gap {
            new.knowledge_gap = gap;
        }

        new.research_results.extend(update.research_results);
        new.sources_gathered.extend(update.sources_gathered);
        new.images.extend(update.images);

        if update.loop_increment {
            new.loop_count += 1;
        }

        new
    }
}

/// Partial state produced by one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchUpdate {
    pub query: Option<String>,
    pub rationale: Option<String>,
    pub summary: Option<String>,
    pub knowledge_gap: Option<String>,
    pub research_results: Vec<String>,
    pub sources_gathered: Vec<String>,
    pub images: Vec<String>,
    pub loop_increment: bool,
}

impl ResearchUpdate {
    /// Check if this update changes nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Update from query generation.
    pub fn query_with_rationale(query: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            rationale: Some(rationale.into()),
            ..Default::default()
        }
    }

    /// Update from one completed web search. Always appends to both
    /// accumulators together so they stay index-aligned.
    pub fn research_pass(
        prompt_block: impl Into<String>,
        citations: impl Into<String>,
        images: Vec<String>,
    ) -> Self {
        Self {
            research_results: vec![prompt_block.into()],
            sources_gathered: vec![citations.into()],
            images,
            loop_increment: true,
            ..Default::default()
        }
    }

    pub fn summary(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Default::default()
        }
    }

    /// Update from reflection: new query and knowledge gap, rationale untouched.
    pub fn reflection(query: impl Into<String>, knowledge_gap: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            knowledge_gap: Some(knowledge_gap.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_has_only_topic() {
        let state = ResearchState::new("effect of caffeine on sleep", "run-1");
        assert_eq!(state.topic, "effect of caffeine on sleep");
        assert_eq!(state.run_id, "run-1");
        assert!(state.query.is_empty());
        assert_eq!(state.loop_count, 0);
        assert!(state.latest_research().is_none());
    }

    #[test]
    fn test_research_pass_keeps_accumulators_aligned() {
        let mut state = ResearchState::new("t", "r");
        for n in 1..=3 {
            state = state.apply_update(ResearchUpdate::research_pass(
                format!("block {n}"),
                format!("* cite {n}"),
                vec![format!("https://img/{n}.png")],
            ));
            assert_eq!(state.loop_count, n);
            assert_eq!(state.research_results.len(), state.sources_gathered.len());
        }
        assert_eq!(state.latest_research(), Some("block 3"));
        assert_eq!(state.images.len(), 3);
    }

    #[test]
    fn test_replace_fields() {
        let state = ResearchState::new("t", "r")
            .apply_update(ResearchUpdate::query_with_rationale("q1", "why"))
            .apply_update(ResearchUpdate::reflection("q2", "gap"));
        assert_eq!(state.query, "q2");
        assert_eq!(state.rationale, "why");
        assert_eq!(state.knowledge_gap, "gap");

        let state = state.apply_update(ResearchUpdate::summary("s1"));
        let state = state.apply_update(ResearchUpdate::summary("s2"));
        assert_eq!(state.summary, "s2");
    }

    #[test]
    fn test_empty_update_is_noop() {
        let state = ResearchState::new("t", "r");
        let update = ResearchUpdate::default();
        assert!(update.is_empty());
        assert_eq!(state.apply_update(update), state);
    }
}
