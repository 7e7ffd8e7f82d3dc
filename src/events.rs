//! Progress events streamed to the subscriber of a run.
//!
//! The orchestrator owns only the send side of an unbounded channel. Sending
//! never waits on the subscriber, so a slow consumer cannot stall a stage; a
//! closed channel means the subscriber went away and the run should stop at
//! the next stage boundary.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

/// Stage tag carried by every progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    GenerateQuery,
    WebResearch,
    Summarize,
    Reflection,
    Routing,
    Finalize,
    RunComplete,
    Error,
    /// Live reasoning text from a model stage, only sent in streaming mode
    Thinking,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::GenerateQuery => "generate_query",
            Stage::WebResearch => "web_research",
            Stage::Summarize => "summarize",
            Stage::Reflection => "reflection",
            Stage::Routing => "routing",
            Stage::Finalize => "finalize",
            Stage::RunComplete => "run_complete",
            Stage::Error => "error",
            Stage::Thinking => "thinking",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress notification: `{run_id, stage, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: String,
    pub stage: Stage,
    pub payload: Value,
}

impl ProgressEvent {
    /// Fetch a string field from the payload, empty if absent.
    pub fn text(&self, field: &str) -> &str {
        self.payload
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Send-side handle bound to a single run.
#[derive(Debug, Clone)]
pub struct EventSink {
    run_id: String,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl EventSink {
    pub fn new(run_id: impl Into<String>, tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            run_id: run_id.into(),
            tx,
        }
    }

    /// Create a sink together with the receiver the subscriber will read.
    pub fn channel(run_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(run_id, tx), rx)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Deliver an event. A lost progress event is not an error.
    pub fn emit(&self, stage: Stage, payload: Value) {
        let event = ProgressEvent {
            run_id: self.run_id.clone(),
            stage,
            payload,
        };
        if self.tx.send(event).is_err() {
            debug!(run_id = %self.run_id, stage = %stage, "Subscriber gone, dropping event");
        }
    }

    /// True once the subscriber has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&Stage::RunComplete).unwrap();
        assert_eq!(json, "\"run_complete\"");
        assert_eq!(Stage::Reflection.to_string(), "reflection");
        assert_eq!(serde_json::to_string(&Stage::Thinking).unwrap(), "\"thinking\"");
    }

    #[tokio::test]
    async fn test_emit_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel("run-1");
        sink.emit(Stage::GenerateQuery, json!({"query": "a"}));
        sink.emit(Stage::WebResearch, json!({}));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.stage, Stage::GenerateQuery);
        assert_eq!(first.run_id, "run-1");
        assert_eq!(first.text("query"), "a");
        assert_eq!(rx.recv().await.unwrap().stage, Stage::WebResearch);
    }

    #[test]
    fn test_emit_after_disconnect_is_silent() {
        let (sink, rx) = EventSink::channel("run-2");
        assert!(!sink.is_closed());
        drop(rx);
        assert!(sink.is_closed());
        sink.emit(Stage::Summarize, json!({}));
    }
}
