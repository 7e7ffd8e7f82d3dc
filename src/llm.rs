//! # Language Model Module
//!
//! Provider-agnostic access to a chat model. Stages only see the
//! [`LanguageModel`] trait; [`OllamaModel`] bridges it to a local Ollama
//! server through Rig.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::{Completion, Message as RigMessage, Prompt};
use rig::providers::ollama;
use rig::streaming::StreamedAssistantContent;
use tracing::debug;

use crate::error::ProviderError;

// =============================================================================
// MESSAGES
// =============================================================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// One role-tagged entry of a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// =============================================================================
// STREAMING
// =============================================================================
/// A finite, single-pass stream of text chunks.
pub struct TextStream {
    inner: BoxStream<'static, Result<String, ProviderError>>,
}

impl TextStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Wrap a complete response as a one-chunk stream.
    pub fn from_complete(text: String) -> Self {
        Self::new(futures::stream::once(async move { Ok(text) }))
    }

    /// Next chunk, or `None` once the model is done.
    pub async fn next_chunk(&mut self) -> Option<Result<String, ProviderError>> {
        self.inner.next().await
    }

    /// Drain the stream into one string, stopping at the first error.
    pub async fn collect_text(mut self) -> Result<String, ProviderError> {
        let mut text = String::new();
        let mut chunks = 0usize;
        while let Some(chunk) = self.inner.next().await {
            text.push_str(&chunk?);
            chunks += 1;
        }
        debug!(chunks, bytes = text.len(), "Model stream drained");
        Ok(text)
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================
/// A chat model that turns a short message list into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single-shot completion.
    async fn invoke(&self, messages: &[Message]) -> Result<String, ProviderError>;

    /// Incremental completion.
    ///
    /// # Rust Concept: Default Trait Methods
    ///
    /// A trait can ship a body for some of its methods. Implementors that
    /// only know how to answer in one piece get streaming for free, while
    /// [`OllamaModel`] overrides it with a real token stream.
    ///
    /// Default implementation falls back to [`LanguageModel::invoke`] and
    /// yields the whole answer as one chunk.
    async fn stream(&self, messages: &[Message]) -> Result<TextStream, ProviderError> {
        let text = self.invoke(messages).await?;
        Ok(TextStream::from_complete(text))
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}

// =============================================================================
// OLLAMA (via Rig)
// =============================================================================
/// Local model served by Ollama.
pub struct OllamaModel {
    client: ollama::Client,
    model: String,
    temperature: f64,
}

impl OllamaModel {
    /// Connect to the Ollama server at `host`.
    ///
    /// Rig's Ollama client reads its base URL from `OLLAMA_API_BASE_URL`.
    pub fn new(host: &str, model: impl Into<String>, temperature: f32) -> Self {
        std::env::set_var("OLLAMA_API_BASE_URL", host);
        let client = ollama::Client::from_env();

        Self {
            client,
            model: model.into(),
            temperature: f64::from(temperature),
        }
    }
}

/// Split messages into a system preamble and the user prompt.
fn split_messages(messages: &[Message]) -> (String, String) {
    let join = |role: Role| {
        messages
            .iter()
            .filter(|m| m.role == role && !m.content.trim().is_empty())
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    (join(Role::System), join(Role::User))
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn invoke(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let (preamble, prompt) = split_messages(messages);

        let agent = self
            .client
            .agent(&self.model)
            .preamble(&preamble)
            .temperature(self.temperature)
            .build();

        debug!(model = %self.model, prompt_len = prompt.len(), "Invoking Ollama model");

        agent
            .prompt(prompt.as_str())
            .await
            .map_err(|e| ProviderError::Model(format!("Ollama request failed: {}", e)))
    }

    async fn stream(&self, messages: &[Message]) -> Result<TextStream, ProviderError> {
        let (preamble, prompt) = split_messages(messages);

        let agent = self
            .client
            .agent(&self.model)
            .preamble(&preamble)
            .temperature(self.temperature)
            .build();

        debug!(model = %self.model, prompt_len = prompt.len(), "Streaming Ollama model");

        let response = agent
            .completion(prompt.as_str(), Vec::<RigMessage>::new())
            .await
            .map_err(|e| ProviderError::Model(format!("Ollama request failed: {}", e)))?
            .stream()
            .await
            .map_err(|e| ProviderError::Model(format!("Ollama stream failed: {}", e)))?;

        // Only answer text is forwarded; `<think>` markers arrive inline in it
        let chunks = response.filter_map(|item| async move {
            match item {
                Ok(StreamedAssistantContent::Text(text)) => Some(Ok(text.text)),
                Ok(_) => None,
                Err(e) => Some(Err(ProviderError::Model(format!("Ollama stream failed: {}", e)))),
            }
        });

        Ok(TextStream::new(chunks))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn invoke(&self, messages: &[Message]) -> Result<String, ProviderError> {
            Ok(messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_stream_fallback_yields_complete_text() {
        let stream = EchoModel
            .stream(&[Message::system("sys"), Message::user("hello")])
            .await
            .unwrap();
        assert_eq!(stream.collect_text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_collect_text_concatenates_chunks() {
        let chunks = vec![Ok("<think>".to_string()), Ok("hm</think>".to_string()), Ok("answer".to_string())];
        let text = TextStream::new(futures::stream::iter(chunks))
            .collect_text()
            .await
            .unwrap();
        assert_eq!(text, "<think>hm</think>answer");
    }

    #[tokio::test]
    async fn test_next_chunk_yields_in_order() {
        let chunks = vec![Ok("a".to_string()), Ok("b".to_string())];
        let mut stream = TextStream::new(futures::stream::iter(chunks));
        assert_eq!(stream.next_chunk().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next_chunk().await.unwrap().unwrap(), "b");
        assert!(stream.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_text_stops_on_error() {
        let chunks = vec![Ok("partial".to_string()), Err(ProviderError::Timeout)];
        let result = TextStream::new(futures::stream::iter(chunks)).collect_text().await;
        assert!(matches!(result, Err(ProviderError::Timeout)));
    }

    #[test]
    fn test_split_messages() {
        let (preamble, prompt) = split_messages(&[
            Message::system("be brief"),
            Message::user("topic: sleep"),
        ]);
        assert_eq!(preamble, "be brief");
        assert_eq!(prompt, "topic: sleep");
    }
}
