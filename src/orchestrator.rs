//! # Orchestrator
//!
//! Drives one research run through the state machine:
//!
//! ```text
//! GenerateQuery -> WebResearch -> Summarize -> Reflect -> Route
//!                       ^                                  |
//!                       +-------- Continue ----------------+
//!                                                          | Finalize
//!                                                          v
//!                                               Finalize -> Done
//! ```
//!
//! Stages run strictly one after another. Each stage's update is merged
//! into the run's state before the next node is chosen. Events are pushed
//! to an unbounded channel, so the subscriber never slows a stage down.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::config::ResearchConfig;
use crate::error::{RunError, StageError};
use crate::events::{EventSink, ProgressEvent, Stage};
use crate::llm::LanguageModel;
use crate::router::{self, Route};
use crate::search::SearchService;
use crate::stages::{self, StageContext};
use crate::state::ResearchState;

/// Nodes of the research state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    GenerateQuery,
    WebResearch,
    Summarize,
    Reflect,
    Route,
    Finalize,
    Done,
}

impl Node {
    /// Event stage reported for this node.
    pub fn stage(&self) -> Stage {
        match self {
            Node::GenerateQuery => Stage::GenerateQuery,
            Node::WebResearch => Stage::WebResearch,
            Node::Summarize => Stage::Summarize,
            Node::Reflect => Stage::Reflection,
            Node::Route => Stage::Routing,
            Node::Finalize => Stage::Finalize,
            Node::Done => Stage::RunComplete,
        }
    }
}

/// Handle to a run started with [`Orchestrator::start`].
pub struct RunHandle {
    pub run_id: String,
    /// Progress events, in stage order. Dropping this cancels the run at
    /// the next stage boundary.
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    /// Resolves to the final state, or the reason the run stopped.
    pub outcome: JoinHandle<Result<ResearchState, RunError>>,
}

/// Runs the research loop against a model and a search provider.
#[derive(Clone)]
pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchService>,
    config: ResearchConfig,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchService>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            model,
            search,
            config,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Spawn a run on the tokio runtime and hand back its event stream.
    ///
    /// Only one run per `run_id` should be in flight; that is up to the
    /// caller.
    pub fn start(&self, topic: impl Into<String>, run_id: impl Into<String>) -> RunHandle {
        let run_id = run_id.into();
        let topic = topic.into();
        let (sink, events) = EventSink::channel(run_id.clone());

        let orchestrator = self.clone();
        let task_run_id = run_id.clone();
        let outcome = tokio::spawn(async move { orchestrator.run(topic, task_run_id, sink).await });

        RunHandle {
            run_id,
            events,
            outcome,
        }
    }

    /// Drive one run to completion on the current task.
    #[instrument(skip(self, topic, sink), fields(model = self.model.name(), search = self.search.name()))]
    pub async fn run(
        &self,
        topic: String,
        run_id: String,
        sink: EventSink,
    ) -> Result<ResearchState, RunError> {
        info!(topic = %topic, max_loops = self.config.max_loops, "Starting research run");

        let ctx = StageContext {
            model: self.model.as_ref(),
            search: self.search.as_ref(),
            config: &self.config,
            events: &sink,
        };

        let mut state = ResearchState::new(topic, run_id);
        let mut node = Node::GenerateQuery;

        loop {
            if should_cancel(node, &sink) {
                info!(node = ?node, "Subscriber disconnected, cancelling run");
                return Err(RunError::Cancelled);
            }
            debug!(node = ?node, loop_count = state.loop_count, "Entering node");

            node = match node {
                Node::GenerateQuery => {
                    let update = self.guard(&sink, node, stages::generate_query(&ctx, &state).await)?;
                    state = state.apply_update(update);
                    Node::WebResearch
                }
                Node::WebResearch => {
                    let update = self.guard(&sink, node, stages::web_research(&ctx, &state).await)?;
                    state = state.apply_update(update);
                    Node::Summarize
                }
                Node::Summarize => {
                    let update = self.guard(&sink, node, stages::summarize(&ctx, &state).await)?;
                    state = state.apply_update(update);
                    Node::Reflect
                }
                Node::Reflect => {
                    let update = self.guard(&sink, node, stages::reflect(&ctx, &state).await)?;
                    state = state.apply_update(update);
                    Node::Route
                }
                Node::Route => {
                    let decision = router::route(&state, self.config.router_bound());
                    info!(decision = decision.as_str(), loop_count = state.loop_count, "Routing");
                    sink.emit(
                        Stage::Routing,
                        json!({"decision": decision.as_str(), "loop_count": state.loop_count}),
                    );
                    match decision {
                        Route::Continue => Node::WebResearch,
                        Route::Finalize => Node::Finalize,
                    }
                }
                Node::Finalize => {
                    let update = stages::finalize(&ctx, &state);
                    state = state.apply_update(update);
                    Node::Done
                }
                Node::Done => break,
            };
        }

        sink.emit(
            Stage::RunComplete,
            json!({"status": "complete", "loop_count": state.loop_count}),
        );
        info!(loop_count = state.loop_count, "Research run complete");

        Ok(state)
    }

    /// Turn a fatal stage failure into an `error` event and a [`RunError`].
    fn guard<T>(
        &self,
        sink: &EventSink,
        node: Node,
        result: Result<T, StageError>,
    ) -> Result<T, RunError> {
        result.map_err(|source| {
            let err = RunError::stage(node.stage(), source);
            error!(stage = %node.stage(), error = %err, "Research run failed");
            sink.emit(
                Stage::Error,
                json!({"stage": node.stage(), "cause": err.to_string()}),
            );
            err
        })
    }
}

/// A run stops when its subscriber is gone, unless the report is already
/// built.
fn should_cancel(node: Node, sink: &EventSink) -> bool {
    node != Node::Done && sink.is_closed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_run_is_not_cancelled_by_disconnect() {
        let (sink, rx) = EventSink::channel("r");
        assert!(!should_cancel(Node::Finalize, &sink));

        drop(rx);
        assert!(should_cancel(Node::GenerateQuery, &sink));
        assert!(should_cancel(Node::Finalize, &sink));
        assert!(!should_cancel(Node::Done, &sink));
    }

    #[test]
    fn test_node_stage_mapping() {
        assert_eq!(Node::Reflect.stage(), Stage::Reflection);
        assert_eq!(Node::Route.stage(), Stage::Routing);
        assert_eq!(Node::Done.stage(), Stage::RunComplete);
    }
}
