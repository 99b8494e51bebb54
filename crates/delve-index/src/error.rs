//! Error types for delve-index.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] delve_llm::LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] delve_memory::VectorStoreError),

    #[error("document error: {0}")]
    Document(#[from] delve_memory::document::DocumentError),

    /// Transport failure talking to a remote cross-encoder.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rerank failed: {0}")]
    Rerank(String),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, IndexError>;
