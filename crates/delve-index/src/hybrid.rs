//! Hybrid retrieval: vector matches plus unseen keyword matches, README-boosted.

use std::collections::HashSet;
use std::sync::Arc;

use delve_memory::{Chunk, ScoredRecord, VectorStore};

use crate::session::IngestionSession;

const README_QUERY_MARKER: &str = "readme";

pub struct HybridRetriever {
    session: Arc<IngestionSession>,
    store: Arc<dyn VectorStore>,
    collection: String,
    readme_boost: usize,
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("collection", &self.collection)
            .field("readme_boost", &self.readme_boost)
            .finish_non_exhaustive()
    }
}

impl HybridRetriever {
    #[must_use]
    pub fn new(
        session: Arc<IngestionSession>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            session,
            store,
            collection: collection.into(),
            readme_boost: 2,
        }
    }

    /// Number of README chunks the documentation boost may prepend.
    #[must_use]
    pub fn with_readme_boost(mut self, n: usize) -> Self {
        self.readme_boost = n;
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<IngestionSession> {
        &self.session
    }

    /// Candidate pool of at most `2 * top_k` chunks for the reranker.
    ///
    /// Without a query vector only keyword matches are used. Vector-store errors are logged
    /// and treated as no matches. An empty store and an empty index yield an empty pool.
    pub async fn retrieve(
        &self,
        query: &str,
        query_vector: Option<Vec<f32>>,
        top_k: usize,
    ) -> Vec<Arc<Chunk>> {
        let vector_hits = match query_vector {
            Some(vector) => match self.store.search(&self.collection, vector, top_k).await {
                Ok(hits) => self.resolve(hits),
                Err(e) => {
                    tracing::warn!("vector search failed, using keyword matches only: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let keyword_hits = self.session.keyword_index().top_n(query, top_k);

        // Vector hits are kept as returned; only keyword hits are deduplicated against them.
        let mut seen: HashSet<String> = vector_hits.iter().map(|c| c.text.clone()).collect();
        let mut merged = vector_hits;
        merged.extend(keyword_hits.into_iter().filter(|c| seen.insert(c.text.clone())));

        if query.to_lowercase().contains(README_QUERY_MARKER) || merged.len() < 2 {
            // Each README chunk goes to the front in turn, so the last one ends up first.
            let mut boosted = 0;
            for chunk in self.session.readme_chunks(self.readme_boost) {
                if seen.insert(chunk.text.clone()) {
                    merged.insert(0, chunk);
                    boosted += 1;
                }
            }
            if boosted > 0 {
                tracing::debug!(count = boosted, "prepending README chunks");
            }
        }

        merged.truncate(top_k * 2);
        merged
    }

    /// Map store hits back to session chunks, falling back to the stored payload for ids the
    /// session does not know. Hits with no content are dropped.
    fn resolve(&self, hits: Vec<ScoredRecord>) -> Vec<Arc<Chunk>> {
        hits.into_iter()
            .filter_map(|hit| {
                if let Some(chunk) = self.session.chunk(&hit.id) {
                    return Some(Arc::clone(chunk));
                }
                if hit.metadata.content.is_empty() {
                    return None;
                }
                Some(Arc::new(Chunk {
                    id: hit.id,
                    text: hit.metadata.content,
                    source_path: hit.metadata.source,
                }))
            })
            .collect()
    }
}
