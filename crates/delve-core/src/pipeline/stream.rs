use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use delve_llm::LlmError;
use delve_llm::provider::ChatStream;
use delve_memory::Chunk;
use futures_core::Stream;

use super::PipelineError;
use crate::cache::{CacheEntry, QueryCache, QueryMetrics};
use crate::metrics::MetricsCollector;
use crate::prompt::{ContextSnippet, format_fallback};

/// One fragment of an answer as it reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerChunk {
    /// Generated text, or a cached answer replayed whole.
    Token(String),
    /// Snippet listing produced because the generator could not be reached.
    Degraded(String),
    /// Terminal failure message; nothing was cached.
    Error(String),
}

impl AnswerChunk {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Token(s) | Self::Degraded(s) | Self::Error(s) => s,
        }
    }
}

/// Everything needed to finish a query once the generator stream is open.
pub(super) struct Generation<'a> {
    inner: ChatStream,
    query: String,
    sources: Vec<Arc<Chunk>>,
    snippets: Vec<ContextSnippet>,
    snippet_chars: usize,
    started: Instant,
    search_time: Duration,
    llm_started: Instant,
    cache: &'a QueryCache,
    metrics: &'a MetricsCollector,
    answer: String,
}

impl<'a> Generation<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        inner: ChatStream,
        query: String,
        sources: Vec<Arc<Chunk>>,
        snippets: Vec<ContextSnippet>,
        snippet_chars: usize,
        started: Instant,
        search_time: Duration,
        cache: &'a QueryCache,
        metrics: &'a MetricsCollector,
    ) -> Self {
        Self {
            inner,
            query,
            sources,
            snippets,
            snippet_chars,
            started,
            search_time,
            llm_started: Instant::now(),
            cache,
            metrics,
            answer: String::new(),
        }
    }

    fn record(&mut self) {
        let metrics = QueryMetrics {
            search_time: self.search_time,
            llm_time: self.llm_started.elapsed(),
            total_time: self.started.elapsed(),
        };
        tracing::info!(query = %self.query, %metrics, "answer recorded");
        self.metrics.update(|m| {
            m.last_search_ms = millis(metrics.search_time);
            m.last_llm_ms = millis(metrics.llm_time);
            m.last_total_ms = millis(metrics.total_time);
        });
        self.cache.insert(
            std::mem::take(&mut self.query),
            CacheEntry {
                answer: std::mem::take(&mut self.answer),
                metrics,
                sources: std::mem::take(&mut self.sources),
            },
        );
    }

    fn fail(&self, err: LlmError) -> AnswerChunk {
        if err.is_unreachable() {
            tracing::warn!("generator became unreachable mid-stream, listing snippets: {err}");
            self.metrics.update(|m| m.degraded_answers += 1);
            AnswerChunk::Degraded(format_fallback(&self.snippets, self.snippet_chars))
        } else {
            tracing::error!("generation failed: {err}");
            self.metrics.update(|m| m.errors += 1);
            AnswerChunk::Error(PipelineError::from(err).to_string())
        }
    }
}

pub(super) enum State<'a> {
    /// A single pre-computed chunk (cache replay, fallback listing, or error).
    Once(Option<AnswerChunk>),
    Generating(Box<Generation<'a>>),
    Done,
}

/// Answer fragments in arrival order.
///
/// The cache entry is written only when the generator stream ends cleanly; dropping an
/// `AnswerStream` early records nothing.
pub struct AnswerStream<'a> {
    state: State<'a>,
}

impl std::fmt::Debug for AnswerStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Once(_) => "once",
            State::Generating(_) => "generating",
            State::Done => "done",
        };
        f.debug_struct("AnswerStream")
            .field("state", &state)
            .finish()
    }
}

impl<'a> AnswerStream<'a> {
    pub(super) fn once(chunk: AnswerChunk) -> Self {
        Self {
            state: State::Once(Some(chunk)),
        }
    }

    pub(super) fn generating(generation: Generation<'a>) -> Self {
        Self {
            state: State::Generating(Box::new(generation)),
        }
    }
}

impl Stream for AnswerStream<'_> {
    type Item = AnswerChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AnswerChunk>> {
        let this = self.get_mut();
        match &mut this.state {
            State::Once(chunk) => {
                let chunk = chunk.take();
                this.state = State::Done;
                Poll::Ready(chunk)
            }
            State::Generating(generation) => loop {
                match generation.inner.as_mut().poll_next(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Some(Ok(fragment))) => {
                        if fragment.is_empty() {
                            continue;
                        }
                        generation.answer.push_str(&fragment);
                        return Poll::Ready(Some(AnswerChunk::Token(fragment)));
                    }
                    Poll::Ready(Some(Err(err))) => {
                        let chunk = generation.fail(err);
                        this.state = State::Done;
                        return Poll::Ready(Some(chunk));
                    }
                    Poll::Ready(None) => {
                        generation.record();
                        this.state = State::Done;
                        return Poll::Ready(None);
                    }
                }
            },
            State::Done => Poll::Ready(None),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
