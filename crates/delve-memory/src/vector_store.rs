use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("vector store unreachable: {0}")]
    Unreachable(String),
    #[error("vector store request timed out")]
    Timeout,
    #[error("vector store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode vector store response: {0}")]
    Decode(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("collection error: {0}")]
    Collection(String),
}

impl VectorStoreError {
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Payload attached to every stored vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Outcome of [`VectorStore::ensure_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Created,
    Existing,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait VectorStore: Send + Sync {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> BoxFuture<'_, Result<CollectionStatus, VectorStoreError>>;

    fn insert(
        &self,
        collection: &str,
        record: VectorRecord,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn update_metadata(
        &self,
        collection: &str,
        id: &str,
        metadata: RecordMetadata,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Return at most `top_k` records ordered by non-increasing score.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, VectorStoreError>>;
}
