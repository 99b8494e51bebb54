//! Vector storage with remote/local fallback, document loading and splitting, and the
//! persisted conversation log.

pub mod document;
pub mod endee;
pub mod error;
pub mod history;
pub mod in_memory_store;
pub mod resilient;
pub mod vector_store;

pub use document::Chunk;
pub use endee::EndeeStore;
pub use error::MemoryError;
pub use history::ConversationLog;
pub use in_memory_store::InMemoryVectorStore;
pub use resilient::{DegradeReason, ResilientVectorStore, StoreMode};
pub use vector_store::{
    CollectionStatus, RecordMetadata, ScoredRecord, VectorRecord, VectorStore, VectorStoreError,
};
