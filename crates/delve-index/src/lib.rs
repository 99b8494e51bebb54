//! Repository ingestion and hybrid retrieval.
//!
//! An [`IngestionSession`] walks a repository once, splits it into chunks, and builds a BM25
//! [`KeywordIndex`] over them. The [`HybridRetriever`] merges vector and keyword matches, and
//! the [`Reranker`] narrows the merged pool to the final context set. [`repo_tree`] lists the
//! repository layout with the same walk rules.

pub mod clean;
pub mod error;
pub mod hybrid;
pub mod keyword;
pub mod rerank;
pub mod session;
pub mod tree;

pub use clean::clean_code;
pub use error::{IndexError, Result};
pub use hybrid::HybridRetriever;
pub use keyword::{Bm25Params, KeywordIndex, tokenize};
#[cfg(feature = "reranker")]
pub use rerank::FastembedCrossEncoder;
pub use rerank::{AnyCrossEncoder, CrossEncoder, LexicalCrossEncoder, Reranker, TeiCrossEncoder};
pub use session::{IngestConfig, IngestReport, IngestionSession};
pub use tree::{EntryKind, TreeEntry, render_tree, repo_tree};
