use std::path::Path;

use super::super::{
    DEFAULT_EXTENSIONS, DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader,
    DocumentMetadata, LoadFuture,
};

/// Loads UTF-8 source files whole. Files that fail to decode are rejected with
/// [`DocumentError::NotUtf8`].
pub struct TextLoader {
    pub max_file_size: u64,
    extensions: Vec<String>,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            extensions: DEFAULT_EXTENSIONS.iter().map(|&e| e.to_owned()).collect(),
        }
    }
}

impl TextLoader {
    #[must_use]
    pub fn new(extensions: Vec<String>, max_file_size: u64) -> Self {
        Self {
            max_file_size,
            extensions,
        }
    }

    /// Whether `path` carries an allow-listed extension (compared case-sensitively).
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }
}

impl DocumentLoader for TextLoader {
    fn load<'a>(&'a self, path: &'a Path) -> LoadFuture<'a> {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            if !self.accepts(&path) {
                return Err(DocumentError::UnsupportedFormat(path.display().to_string()));
            }

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("md") => "text/markdown",
                Some("json") => "application/json",
                Some("html") => "text/html",
                _ => "text/plain",
            };

            let bytes = tokio::fs::read(&path).await?;
            let content = String::from_utf8(bytes).map_err(|_| DocumentError::NotUtf8(path.clone()))?;

            Ok(vec![Document {
                content,
                metadata: DocumentMetadata {
                    source: path.display().to_string(),
                    content_type: content_type.to_owned(),
                },
            }])
        })
    }

    fn supported_extensions(&self) -> &[String] {
        &self.extensions
    }
}
