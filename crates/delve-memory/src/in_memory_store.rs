use std::collections::HashMap;
use std::sync::RwLock;

use crate::vector_store::{
    BoxFuture, CollectionStatus, RecordMetadata, ScoredRecord, VectorRecord, VectorStore,
    VectorStoreError,
};

/// Records kept in insertion order; `index` maps id to position.
#[derive(Default)]
struct InMemoryCollection {
    records: Vec<VectorRecord>,
    index: HashMap<String, usize>,
}

impl InMemoryCollection {
    fn upsert(&mut self, record: VectorRecord) {
        if let Some(&pos) = self.index.get(&record.id) {
            self.records[pos] = record;
        } else {
            self.index.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }
    }
}

/// Exact-search vector store held entirely in process memory.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records in `collection`, zero if it does not exist.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|cols| cols.get(collection).map_or(0, |c| c.records.len()))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    pub(crate) fn ensure_sync(&self, collection: &str) -> Result<CollectionStatus, VectorStoreError> {
        let mut cols = self
            .collections
            .write()
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        if cols.contains_key(collection) {
            return Ok(CollectionStatus::Existing);
        }
        cols.insert(collection.to_owned(), InMemoryCollection::default());
        Ok(CollectionStatus::Created)
    }

    pub(crate) fn insert_sync(
        &self,
        collection: &str,
        record: VectorRecord,
    ) -> Result<(), VectorStoreError> {
        let mut cols = self
            .collections
            .write()
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        cols.entry(collection.to_owned())
            .or_default()
            .upsert(record);
        Ok(())
    }

    pub(crate) fn update_metadata_sync(
        &self,
        collection: &str,
        id: &str,
        metadata: RecordMetadata,
    ) -> Result<(), VectorStoreError> {
        let mut cols = self
            .collections
            .write()
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        if let Some(col) = cols.get_mut(collection)
            && let Some(&pos) = col.index.get(id)
        {
            col.records[pos].metadata = metadata;
        }
        Ok(())
    }

    /// Cosine similarity against every stored vector, sorted descending, truncated to `top_k`.
    ///
    /// Ties keep insertion order.
    pub(crate) fn search_sync(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let cols = self
            .collections
            .read()
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        let Some(col) = cols.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredRecord> = col
            .records
            .iter()
            .map(|r| ScoredRecord {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .finish_non_exhaustive()
    }
}

/// Zero-norm vectors score 0.0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        _vector_size: usize,
    ) -> BoxFuture<'_, Result<CollectionStatus, VectorStoreError>> {
        let result = self.ensure_sync(collection);
        Box::pin(async move { result })
    }

    fn insert(
        &self,
        collection: &str,
        record: VectorRecord,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let result = self.insert_sync(collection, record);
        Box::pin(async move { result })
    }

    fn update_metadata(
        &self,
        collection: &str,
        id: &str,
        metadata: RecordMetadata,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let result = self.update_metadata_sync(collection, id, metadata);
        Box::pin(async move { result })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, VectorStoreError>> {
        let result = self.search_sync(collection, &vector, top_k);
        Box::pin(async move { result })
    }
}
