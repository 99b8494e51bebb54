//! BM25 Okapi keyword index over ingested chunks.

use std::collections::HashMap;
use std::sync::Arc;

use delve_memory::Chunk;

/// Okapi BM25 tuning constants.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    /// Fraction of the mean idf substituted for negative idf values.
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Lowercase, drop everything but alphanumerics, `_` and whitespace, then split on whitespace.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    normalized.split_whitespace().map(str::to_owned).collect()
}

pub struct KeywordIndex {
    chunks: Vec<Arc<Chunk>>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
    params: Bm25Params,
}

impl std::fmt::Debug for KeywordIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordIndex")
            .field("chunks", &self.chunks.len())
            .field("terms", &self.idf.len())
            .finish_non_exhaustive()
    }
}

impl KeywordIndex {
    #[must_use]
    pub fn build(chunks: Vec<Arc<Chunk>>) -> Self {
        Self::with_params(chunks, Bm25Params::default())
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn with_params(chunks: Vec<Arc<Chunk>>, params: Bm25Params) -> Self {
        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_lens = Vec::with_capacity(chunks.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for chunk in &chunks {
            let tokens = tokenize(&chunk.text);
            doc_lens.push(tokens.len());
            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_default() += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
            term_freqs.push(freqs);
        }

        let n = chunks.len() as f64;
        let avg_doc_len = if chunks.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<usize>() as f64 / n
        };

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, df) in doc_freq {
            let df = df as f64;
            let value = ((n - df + 0.5) / (df + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }
        if !idf.is_empty() {
            let floor = params.epsilon * idf_sum / idf.len() as f64;
            for term in negative {
                idf.insert(term, floor);
            }
        }

        tracing::debug!(chunks = chunks.len(), terms = idf.len(), "keyword index built");

        Self {
            chunks,
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
            params,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// BM25 score of every chunk against `query`, in chunk order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let Bm25Params { k1, b, .. } = self.params;
        let mut scores = vec![0.0; self.chunks.len()];

        for term in tokenize(query) {
            let Some(&idf) = self.idf.get(&term) else {
                continue;
            };
            for (i, freqs) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = freqs.get(&term) else {
                    continue;
                };
                let tf = f64::from(tf);
                let norm = 1.0 - b + b * self.doc_lens[i] as f64 / self.avg_doc_len;
                scores[i] += idf * (tf * (k1 + 1.0)) / (tf + k1 * norm);
            }
        }
        scores
    }

    /// The `n` highest-scoring chunks. Zero-score chunks are included when fewer than `n`
    /// chunks match; ties keep ingestion order.
    #[must_use]
    pub fn top_n(&self, query: &str, n: usize) -> Vec<Arc<Chunk>> {
        let scores = self.scores(query);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
            .into_iter()
            .take(n)
            .map(|i| Arc::clone(&self.chunks[i]))
            .collect()
    }
}
