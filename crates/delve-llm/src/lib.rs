//! Embedding and text-generation providers consumed by the retrieval pipeline.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;

pub use error::LlmError;
pub use provider::LlmProvider;
