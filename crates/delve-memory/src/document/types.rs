use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub source: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Unit of indexing and retrieval. Immutable once produced by ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_path: String,
}

impl Chunk {
    /// Final path component of `source_path`, or the whole path if it has none.
    #[must_use]
    pub fn basename(&self) -> &str {
        Path::new(&self.source_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.source_path)
    }

    #[must_use]
    pub fn is_readme(&self) -> bool {
        self.source_path.to_lowercase().contains("readme.md")
    }
}
