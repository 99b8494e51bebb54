//! Second-pass relevance scoring over the hybrid candidate pool.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use delve_memory::Chunk;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::keyword::tokenize;

#[cfg(feature = "reranker")]
mod model;

#[cfg(feature = "reranker")]
pub use model::FastembedCrossEncoder;

/// Scores `(query, text)` pairs; higher is more relevant.
pub trait CrossEncoder: Send + Sync {
    /// Return one score per text, in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the scoring backend fails.
    fn score(&self, query: &str, texts: &[&str]) -> impl Future<Output = Result<Vec<f32>>> + Send;

    fn name(&self) -> &str;
}

/// In-process scorer: fraction of distinct query terms present in the text, plus half the
/// fraction of query bigrams present in order. Used when no cross-encoder model is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalCrossEncoder;

impl LexicalCrossEncoder {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score_pair(query: &str, text: &str) -> f32 {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return 0.0;
        }
        let text_tokens = tokenize(text);
        let text_terms: HashSet<&str> = text_tokens.iter().map(String::as_str).collect();

        let query_terms: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
        let covered = query_terms.iter().filter(|t| text_terms.contains(*t)).count();
        let coverage = covered as f32 / query_terms.len() as f32;

        let query_bigrams: HashSet<(&str, &str)> = query_tokens
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        if query_bigrams.is_empty() {
            return coverage;
        }
        let text_bigrams: HashSet<(&str, &str)> = text_tokens
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        let matched = query_bigrams.intersection(&text_bigrams).count();
        coverage + 0.5 * matched as f32 / query_bigrams.len() as f32
    }
}

impl CrossEncoder for LexicalCrossEncoder {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        Ok(texts
            .iter()
            .map(|text| Self::score_pair(query, text))
            .collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "lexical"
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [&'a str],
}

#[derive(Deserialize)]
struct RerankScore {
    index: usize,
    score: f32,
}

/// Client for a text-embeddings-inference style `/rerank` endpoint.
#[derive(Debug, Clone)]
pub struct TeiCrossEncoder {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl TeiCrossEncoder {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: delve_llm::http::default_client(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl CrossEncoder for TeiCrossEncoder {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        let resp = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .timeout(self.timeout)
            .json(&RerankRequest { query, texts })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Rerank(format!("HTTP {status}: {body}")));
        }

        let ranked: Vec<RerankScore> = resp.json().await?;
        let mut scores = vec![f32::NEG_INFINITY; texts.len()];
        for item in ranked {
            let slot = scores.get_mut(item.index).ok_or_else(|| {
                IndexError::Rerank(format!("index {} out of range", item.index))
            })?;
            *slot = item.score;
        }
        Ok(scores)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "tei"
    }
}

/// Cross-encoder selected at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyCrossEncoder {
    #[cfg(feature = "reranker")]
    Fastembed(FastembedCrossEncoder),
    Lexical(LexicalCrossEncoder),
    Tei(TeiCrossEncoder),
}

impl CrossEncoder for AnyCrossEncoder {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        match self {
            #[cfg(feature = "reranker")]
            Self::Fastembed(e) => e.score(query, texts).await,
            Self::Lexical(e) => e.score(query, texts).await,
            Self::Tei(e) => e.score(query, texts).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            #[cfg(feature = "reranker")]
            Self::Fastembed(e) => e.name(),
            Self::Lexical(e) => e.name(),
            Self::Tei(e) => e.name(),
        }
    }
}

pub struct Reranker<E: CrossEncoder> {
    encoder: E,
    final_k: usize,
}

impl<E: CrossEncoder> Reranker<E> {
    #[must_use]
    pub fn new(encoder: E, final_k: usize) -> Self {
        Self { encoder, final_k }
    }

    #[must_use]
    pub fn final_k(&self) -> usize {
        self.final_k
    }

    #[must_use]
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Reorder `candidates` by cross-encoder score and keep the best `final_k`.
    ///
    /// The output is always a prefix of a permutation of the input. If scoring fails the input
    /// order is kept.
    pub async fn rerank(&self, query: &str, candidates: Vec<Arc<Chunk>>) -> Vec<Arc<Chunk>> {
        if candidates.is_empty() {
            return candidates;
        }

        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let scores = match self.encoder.score(query, &texts).await {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    encoder = self.encoder.name(),
                    expected = candidates.len(),
                    got = scores.len(),
                    "reranker returned wrong number of scores, keeping retrieval order"
                );
                return truncated(candidates, self.final_k);
            }
            Err(e) => {
                tracing::warn!(
                    encoder = self.encoder.name(),
                    "reranking failed, keeping retrieval order: {e}"
                );
                return truncated(candidates, self.final_k);
            }
        };

        let mut ranked: Vec<(f32, Arc<Chunk>)> = scores.into_iter().zip(candidates).collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        ranked
            .into_iter()
            .take(self.final_k)
            .map(|(_, chunk)| chunk)
            .collect()
    }
}

fn truncated(mut candidates: Vec<Arc<Chunk>>, n: usize) -> Vec<Arc<Chunk>> {
    candidates.truncate(n);
    candidates
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn chunks(texts: &[&str]) -> Vec<Arc<Chunk>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Arc::new(Chunk {
                    id: format!("chunk_{i}"),
                    text: (*t).to_owned(),
                    source_path: "f.rs".into(),
                })
            })
            .collect()
    }

    fn ids(chunks: &[Arc<Chunk>]) -> Vec<&str> {
        chunks.iter().map(|c| c.id.as_str()).collect()
    }

    struct FailingEncoder;

    impl CrossEncoder for FailingEncoder {
        async fn score(&self, _query: &str, _texts: &[&str]) -> Result<Vec<f32>> {
            Err(IndexError::Rerank("model not loaded".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn lexical_prefers_full_phrase() {
        let query = "open database connection";
        let full = LexicalCrossEncoder::score_pair(query, "fn open_db() { open database connection }");
        let partial = LexicalCrossEncoder::score_pair(query, "database schema");
        let none = LexicalCrossEncoder::score_pair(query, "render widget");
        assert!(full > partial);
        assert!(partial > none);
        assert!(none.abs() < f32::EPSILON);
    }

    #[test]
    fn lexical_empty_query_scores_zero() {
        assert!(LexicalCrossEncoder::score_pair("?!", "anything").abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn rerank_orders_and_caps() {
        let reranker = Reranker::new(LexicalCrossEncoder, 3);
        let candidates = chunks(&[
            "render widget",
            "parse config file",
            "config",
            "unrelated text",
            "parse config",
        ]);
        let result = reranker.rerank("parse config", candidates).await;
        assert_eq!(ids(&result), vec!["chunk_1", "chunk_4", "chunk_2"]);
    }

    #[tokio::test]
    async fn rerank_empty_is_empty() {
        let reranker = Reranker::new(LexicalCrossEncoder, 3);
        assert!(reranker.rerank("q", Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn rerank_fewer_than_final_k_returns_all() {
        let reranker = Reranker::new(LexicalCrossEncoder, 3);
        let result = reranker.rerank("beta", chunks(&["alpha", "beta"])).await;
        assert_eq!(ids(&result), vec!["chunk_1", "chunk_0"]);
    }

    #[tokio::test]
    async fn scoring_failure_keeps_input_order() {
        let reranker = Reranker::new(FailingEncoder, 2);
        let result = reranker.rerank("q", chunks(&["a", "b", "c"])).await;
        assert_eq!(ids(&result), vec!["chunk_0", "chunk_1"]);
    }

    #[tokio::test]
    async fn tei_scores_mapped_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .and(body_partial_json(serde_json::json!({"query": "q"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"index": 1, "score": 0.9},
                {"index": 0, "score": 0.1},
            ])))
            .mount(&server)
            .await;

        let encoder = TeiCrossEncoder::new(&server.uri());
        let scores = encoder.score("q", &["first", "second"]).await.unwrap();
        assert!((scores[0] - 0.1).abs() < 1e-6);
        assert!((scores[1] - 0.9).abs() < 1e-6);

        let reranker = Reranker::new(AnyCrossEncoder::Tei(encoder), 3);
        let result = reranker.rerank("q", chunks(&["first", "second"])).await;
        assert_eq!(ids(&result), vec!["chunk_1", "chunk_0"]);
    }

    #[tokio::test]
    async fn tei_out_of_range_index_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"index": 7, "score": 0.9}])),
            )
            .mount(&server)
            .await;

        let reranker = Reranker::new(TeiCrossEncoder::new(&server.uri()), 3);
        let result = reranker.rerank("q", chunks(&["a", "b"])).await;
        assert_eq!(ids(&result), vec!["chunk_0", "chunk_1"]);
    }

    #[tokio::test]
    async fn tei_server_error_is_rerank_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading"))
            .mount(&server)
            .await;

        let err = TeiCrossEncoder::new(&server.uri())
            .score("q", &["a"])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Rerank(msg) if msg.contains("503")));
    }

    mod proptest_rerank {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn output_is_permutation_prefix(
                texts in proptest::collection::vec("[a-e ]{0,20}", 0..12),
                query in "[a-e ]{0,10}",
                final_k in 1usize..6,
            ) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                let input = chunks(&refs);
                let reranker = Reranker::new(LexicalCrossEncoder, final_k);
                let output = rt.block_on(reranker.rerank(&query, input.clone()));

                prop_assert_eq!(output.len(), final_k.min(input.len()));
                let mut seen = HashSet::new();
                for chunk in &output {
                    prop_assert!(input.iter().any(|c| Arc::ptr_eq(c, chunk)));
                    prop_assert!(seen.insert(chunk.id.clone()));
                }
            }
        }
    }
}
