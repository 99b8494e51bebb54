//! Per-query orchestration: embed, retrieve, rerank, clean, prompt, stream, record.

mod stream;

pub use stream::{AnswerChunk, AnswerStream};

use std::time::Instant;

use delve_index::{CrossEncoder, HybridRetriever, Reranker};
use delve_llm::provider::Message;
use delve_llm::{LlmError, LlmProvider};
use tokio_stream::StreamExt;

use crate::cache::{CacheEntry, QueryCache};
use crate::config::RetrievalConfig;
use crate::metrics::MetricsCollector;
use crate::prompt::{ContextSnippet, build_prompt, format_fallback};
use stream::Generation;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Error: {0}")]
    Llm(#[from] LlmError),

    /// A failure already rendered as an [`AnswerChunk::Error`].
    #[error("{0}")]
    Reported(String),
}

/// Retrieval knobs the pipeline reads on every query.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub snippet_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for PipelineSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            snippet_chars: config.snippet_chars,
        }
    }
}

/// A collected answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// True when the text is a snippet listing rather than generated output.
    pub degraded: bool,
}

pub struct QueryPipeline<P: LlmProvider, E: CrossEncoder> {
    retriever: HybridRetriever,
    provider: P,
    reranker: Reranker<E>,
    cache: QueryCache,
    metrics: MetricsCollector,
    settings: PipelineSettings,
}

impl<P: LlmProvider, E: CrossEncoder> std::fmt::Debug for QueryPipeline<P, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("provider", &self.provider.name())
            .field("retriever", &self.retriever)
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider, E: CrossEncoder> QueryPipeline<P, E> {
    #[must_use]
    pub fn new(
        retriever: HybridRetriever,
        provider: P,
        reranker: Reranker<E>,
        cache: QueryCache,
        metrics: MetricsCollector,
    ) -> Self {
        metrics.update(|m| m.provider_name = provider.name().to_owned());
        Self {
            retriever,
            provider,
            reranker,
            cache,
            metrics,
            settings: PipelineSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    #[must_use]
    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    #[must_use]
    pub fn cached(&self, query: &str) -> Option<std::sync::Arc<CacheEntry>> {
        self.cache.get(query)
    }

    /// Answer `query`, streaming fragments as the generator produces them.
    ///
    /// Never fails outright: retrieval problems degrade to fewer candidates, an unreachable
    /// generator yields a [`AnswerChunk::Degraded`] snippet listing, and any other generator
    /// failure yields a single [`AnswerChunk::Error`].
    pub async fn ask(&self, query: &str) -> AnswerStream<'_> {
        let started = Instant::now();
        self.metrics.update(|m| m.queries += 1);

        if let Some(hit) = self.cache.get(query) {
            tracing::debug!(query, "answer served from cache");
            self.metrics.update(|m| m.cache_hits += 1);
            return AnswerStream::once(AnswerChunk::Token(hit.answer.clone()));
        }

        let query_vector = match self.provider.embed(query).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!("query embedding failed, using keyword matches only: {e}");
                None
            }
        };

        let candidates = self
            .retriever
            .retrieve(query, query_vector, self.settings.top_k)
            .await;
        let candidate_count = candidates.len();
        let sources = self.reranker.rerank(query, candidates).await;
        let search_time = started.elapsed();
        tracing::debug!(
            candidates = candidate_count,
            selected = sources.len(),
            search_ms = search_time.as_millis(),
            "retrieval finished"
        );
        self.metrics.update(|m| {
            m.candidates_retrieved = candidate_count as u64;
        });

        let snippets: Vec<ContextSnippet> =
            sources.iter().map(|c| ContextSnippet::from_chunk(c)).collect();
        let prompt = build_prompt(query, &snippets);

        match self.provider.chat_stream(&[Message::user(prompt)]).await {
            Ok(inner) => AnswerStream::generating(Generation::new(
                inner,
                query.to_owned(),
                sources,
                snippets,
                self.settings.snippet_chars,
                started,
                search_time,
                &self.cache,
                &self.metrics,
            )),
            Err(e) if e.is_unreachable() => {
                tracing::warn!("generator unreachable, listing retrieved snippets: {e}");
                self.metrics.update(|m| m.degraded_answers += 1);
                AnswerStream::once(AnswerChunk::Degraded(format_fallback(
                    &snippets,
                    self.settings.snippet_chars,
                )))
            }
            Err(e) => {
                tracing::error!("generation failed: {e}");
                self.metrics.update(|m| m.errors += 1);
                AnswerStream::once(AnswerChunk::Error(PipelineError::from(e).to_string()))
            }
        }
    }

    /// Drive [`ask`](Self::ask) to completion and collect the text.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Reported`] when the stream ends with an error chunk.
    pub async fn answer(&self, query: &str) -> Result<Answer, PipelineError> {
        let mut stream = self.ask(query).await;
        let mut text = String::new();
        let mut degraded = false;
        while let Some(chunk) = stream.next().await {
            match chunk {
                AnswerChunk::Token(t) => text.push_str(&t),
                AnswerChunk::Degraded(t) => {
                    text.push_str(&t);
                    degraded = true;
                }
                AnswerChunk::Error(msg) => return Err(PipelineError::Reported(msg)),
            }
        }
        Ok(Answer { text, degraded })
    }
}
