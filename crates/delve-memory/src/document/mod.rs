//! Loading repository files into documents and splitting them into chunks.

pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

pub use error::DocumentError;
pub use loader::TextLoader;
pub use splitter::{SplitterConfig, TextSplitter};
pub use types::{Chunk, Document, DocumentMetadata};

/// Files larger than this are skipped: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Source-file extensions ingested by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "py", "js", "java", "ts", "cpp", "c", "cs", "go", "rs", "swift", "kt", "rb", "php", "html",
    "css", "md", "json",
];

pub type LoadFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Document>, DocumentError>> + Send + 'a>>;

pub trait DocumentLoader: Send + Sync {
    fn load<'a>(&'a self, path: &'a Path) -> LoadFuture<'a>;

    /// Extensions without the leading dot.
    fn supported_extensions(&self) -> &[String];
}
