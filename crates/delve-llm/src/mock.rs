//! Test-only mock LLM provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    /// Per-text embeddings; texts not listed fall back to `embedding`.
    pub embeddings: HashMap<String, Vec<f32>>,
    pub fail_chat: bool,
    pub fail_embed: bool,
    pub unreachable: bool,
    /// Fragment index after which the stream yields an error instead of continuing.
    pub fail_stream_after: Option<usize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embedding: vec![0.0; 384],
            embeddings: HashMap::new(),
            fail_chat: false,
            fail_embed: false,
            unreachable: false,
            fail_stream_after: None,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_embed() -> Self {
        Self {
            fail_embed: true,
            ..Self::default()
        }
    }

    /// Behaves like a generator whose endpoint refuses connections.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.insert(text.into(), vector);
        self
    }

    #[must_use]
    pub fn with_default_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = vector;
        self
    }

    #[must_use]
    pub fn with_stream_failure_after(mut self, fragments: usize) -> Self {
        self.fail_stream_after = Some(fragments);
        self
    }

    /// Contents of the last user message of every chat call, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LlmProvider for MockProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        if self.unreachable {
            return Err(LlmError::Unavailable("connection refused".into()));
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let response = self.chat(messages).await?;
        let mut chunks: Vec<Result<String, LlmError>> = response
            .split_inclusive(' ')
            .map(|c| Ok(c.to_owned()))
            .collect();
        if let Some(n) = self.fail_stream_after {
            chunks.truncate(n);
            chunks.push(Err(LlmError::Stream("mock stream broke".into())));
        }
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.fail_embed {
            return Err(LlmError::Other("mock embed error".into()));
        }
        Ok(self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.embedding.clone()))
    }
}
