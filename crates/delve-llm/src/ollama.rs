use std::future::Future;
use std::time::Duration;

use futures_core::Stream;
use ollama_rs::Ollama;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::{ChatMessage, ChatMessageResponse};
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message, Role};

const PROVIDER: &str = "ollama";
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
    timeout: Duration,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
            timeout: Duration::from_secs(120),
        }
    }

    /// Upper bound for a whole chat or embedding call. A stream is bounded until it opens.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Unavailable`] if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        bounded(HEALTH_CHECK_TIMEOUT, self.client.list_local_models()).await?;
        Ok(())
    }

    fn request(&self, messages: &[Message]) -> ChatMessageRequest {
        ChatMessageRequest::new(
            self.model.clone(),
            messages.iter().map(convert_message).collect(),
        )
    }
}

/// Run an Ollama call under `limit`, classifying its failure.
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ollama_rs::error::OllamaError>>,
) -> Result<T, LlmError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(LlmError::from_ollama),
        Err(_) => Err(LlmError::Timeout),
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let response = bounded(
            self.timeout,
            self.client.send_chat_messages(self.request(messages)),
        )
        .await?;
        Ok(response.message.content)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let stream = bounded(
            self.timeout,
            self.client.send_chat_messages_stream(self.request(messages)),
        )
        .await?;
        tracing::debug!(model = %self.model, "ollama stream opened");
        Ok(into_fragments(stream))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );
        let response = bounded(self.timeout, self.client.generate_embeddings(request)).await?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

/// Message contents of a chat response stream, without the empty closing fragment.
fn into_fragments<S>(stream: S) -> ChatStream
where
    S: Stream<Item = Result<ChatMessageResponse, ()>> + Send + 'static,
{
    let mapped = stream
        .map(|item| match item {
            Ok(response) => Ok(response.message.content),
            Err(()) => Err(LlmError::Stream("ollama stream chunk failed".into())),
        })
        .filter(|item| !matches!(item, Ok(fragment) if fragment.is_empty()));
    Box::pin(mapped)
}

fn convert_message(msg: &Message) -> ChatMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatMessage::system(text),
        Role::User => ChatMessage::user(text),
        Role::Assistant => ChatMessage::assistant(text),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            return (url[..colon_pos].to_owned(), port);
        }
    }
    (url.to_owned(), 11434)
}
