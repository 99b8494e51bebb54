use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub vector_store: VectorStoreConfig,
    pub ingest: IngestSection,
    pub retrieval: RetrievalConfig,
    pub rerank: RerankConfig,
    pub cache: CacheConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    /// Upper bound for a whole generation stream.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".into(),
            model: "mistral".into(),
            embedding_model: "all-minilm".into(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// When false the store runs in local mode from the start.
    pub enabled: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Index name; defaults to the repository directory name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    pub vector_dim: usize,
    pub create_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:8080".into(),
            token: None,
            collection: None,
            vector_dim: 384,
            create_timeout_ms: 2000,
            request_timeout_ms: 5000,
        }
    }
}

impl VectorStoreConfig {
    #[must_use]
    pub fn create_timeout(&self) -> Duration {
        Duration::from_millis(self.create_timeout_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Configured collection, or the final component of `repo` with characters outside
    /// `[A-Za-z0-9_-]` replaced by `_`.
    #[must_use]
    pub fn collection_for(&self, repo: &Path) -> String {
        if let Some(name) = &self.collection {
            return name.clone();
        }
        let base = repo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sanitized: String = base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if sanitized.is_empty() {
            "repository".into()
        } else {
            sanitized
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestSection {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extensions: Vec<String>,
    pub max_file_size: u64,
}

impl Default for IngestSection {
    fn default() -> Self {
        let defaults = delve_index::IngestConfig::default();
        Self {
            chunk_size: defaults.chunk_size,
            chunk_overlap: defaults.chunk_overlap,
            extensions: defaults.extensions,
            max_file_size: defaults.max_file_size,
        }
    }
}

impl From<&IngestSection> for delve_index::IngestConfig {
    fn from(section: &IngestSection) -> Self {
        Self {
            chunk_size: section.chunk_size,
            chunk_overlap: section.chunk_overlap,
            extensions: section.extensions.clone(),
            max_file_size: section.max_file_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Matches fetched from each of the vector store and the keyword index.
    pub top_k: usize,
    /// Chunks kept after reranking.
    pub final_k: usize,
    /// README chunks the documentation boost may prepend.
    pub readme_boost: usize,
    /// Characters of each snippet shown when generation is unavailable.
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            final_k: 3,
            readme_boost: 2,
            snippet_chars: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankProvider {
    /// Local ONNX cross-encoder; falls back to `Lexical` when the model cannot load.
    #[default]
    #[serde(rename = "cross-encoder")]
    CrossEncoder,
    Lexical,
    Tei,
}

impl RerankProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrossEncoder => "cross-encoder",
            Self::Lexical => "lexical",
            Self::Tei => "tei",
        }
    }
}

impl std::fmt::Display for RerankProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RerankConfig {
    pub provider: RerankProvider,
    /// Cross-encoder model name, e.g. `bge-reranker-base`.
    pub model: String,
    /// Where downloaded model files are kept; the library default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: RerankProvider::CrossEncoder,
            model: "bge-reranker-base".into(),
            cache_dir: None,
            url: None,
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub file_name: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_name: delve_memory::history::DEFAULT_HISTORY_FILE.into(),
        }
    }
}
