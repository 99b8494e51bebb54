//! Ingestion session: walk → load → split → keyword index, then embed → store on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use delve_llm::LlmProvider;
use delve_memory::document::{
    DEFAULT_EXTENSIONS, DEFAULT_MAX_FILE_SIZE, Document, DocumentLoader, SplitterConfig,
    TextLoader, TextSplitter,
};
use delve_memory::{Chunk, RecordMetadata, VectorRecord, VectorStore};

use crate::error::{IndexError, Result};
use crate::keyword::KeywordIndex;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extensions: Vec<String>,
    pub max_file_size: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            extensions: DEFAULT_EXTENSIONS.iter().map(|&e| e.to_owned()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Summary of a scan plus the vector population that followed it.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub files_scanned: usize,
    pub files_loaded: usize,
    pub chunks_created: usize,
    pub vectors_stored: usize,
    pub embed_failures: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Repository walk in file-name order that skips hidden entries and ignores `.gitignore`.
pub(crate) fn walker(root: &Path) -> ignore::WalkBuilder {
    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b));
    builder
}

#[derive(Debug, Default, Clone, Copy)]
struct ScanStats {
    files_scanned: usize,
    files_loaded: usize,
}

/// Chunks of one repository and the keyword index over them.
///
/// Built once and shared by reference with retrieval; chunks are never mutated afterwards.
pub struct IngestionSession {
    root: PathBuf,
    chunks: Vec<Arc<Chunk>>,
    by_id: HashMap<String, usize>,
    keyword: KeywordIndex,
    stats: ScanStats,
}

impl std::fmt::Debug for IngestionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionSession")
            .field("root", &self.root)
            .field("chunks", &self.chunks.len())
            .finish_non_exhaustive()
    }
}

impl IngestionSession {
    /// Scan `root`, skipping hidden entries and files outside the extension allow-list.
    /// Files that cannot be read or decoded are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotADirectory`] if `root` is not a directory.
    pub async fn build(root: &Path, config: &IngestConfig) -> Result<Self> {
        if !tokio::fs::metadata(root).await.is_ok_and(|m| m.is_dir()) {
            return Err(IndexError::NotADirectory(root.to_path_buf()));
        }

        let loader = TextLoader::new(config.extensions.clone(), config.max_file_size);
        let entries: Vec<PathBuf> = walker(root)
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|p| loader.accepts(p))
            .collect();

        let mut stats = ScanStats {
            files_scanned: entries.len(),
            ..ScanStats::default()
        };
        tracing::info!(root = %root.display(), files = stats.files_scanned, "scanning repository");

        let mut documents: Vec<Document> = Vec::new();
        for path in &entries {
            match loader.load(path).await {
                Ok(docs) => {
                    stats.files_loaded += 1;
                    documents.extend(docs);
                }
                Err(e) => tracing::debug!(path = %path.display(), "skipping file: {e}"),
            }
        }

        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        });
        let chunks = splitter.split_documents(&documents);
        tracing::info!(
            files = stats.files_loaded,
            chunks = chunks.len(),
            "repository split into chunks"
        );

        let mut session = Self::from_chunks(root, chunks);
        session.stats = stats;
        Ok(session)
    }

    /// Session over pre-split chunks; ids must be unique.
    #[must_use]
    pub fn from_chunks(root: &Path, chunks: Vec<Chunk>) -> Self {
        let chunks: Vec<Arc<Chunk>> = chunks.into_iter().map(Arc::new).collect();
        let by_id = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        let keyword = KeywordIndex::build(chunks.clone());
        Self {
            root: root.to_path_buf(),
            chunks,
            by_id,
            keyword,
            stats: ScanStats::default(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn chunk(&self, id: &str) -> Option<&Arc<Chunk>> {
        self.by_id.get(id).map(|&i| &self.chunks[i])
    }

    #[must_use]
    pub fn keyword_index(&self) -> &KeywordIndex {
        &self.keyword
    }

    /// First `n` chunks, in ingestion order, whose source path contains `readme.md`.
    #[must_use]
    pub fn readme_chunks(&self, n: usize) -> Vec<Arc<Chunk>> {
        self.chunks
            .iter()
            .filter(|c| c.is_readme())
            .take(n)
            .cloned()
            .collect()
    }

    /// Embed every chunk and insert it into `store`.
    ///
    /// Per-chunk failures are counted, not fatal. An unreachable embedding endpoint stops the
    /// run early since every remaining chunk would fail the same way; retrieval then relies on
    /// the keyword index alone.
    pub async fn populate<P: LlmProvider>(
        &self,
        provider: &P,
        store: &dyn VectorStore,
        collection: &str,
    ) -> IngestReport {
        let start = Instant::now();
        let mut report = IngestReport {
            files_scanned: self.stats.files_scanned,
            files_loaded: self.stats.files_loaded,
            chunks_created: self.chunks.len(),
            ..IngestReport::default()
        };

        for (i, chunk) in self.chunks.iter().enumerate() {
            let vector = match provider.embed(&chunk.text).await {
                Ok(v) => v,
                Err(e) if e.is_unreachable() => {
                    report.embed_failures += self.chunks.len() - i;
                    report.errors.push(format!("embedding endpoint unreachable: {e}"));
                    tracing::warn!("embedding endpoint unreachable, vector search disabled: {e}");
                    break;
                }
                Err(e) => {
                    report.embed_failures += 1;
                    report.errors.push(format!("{}: {e}", chunk.id));
                    tracing::debug!(id = %chunk.id, "embedding failed: {e}");
                    continue;
                }
            };

            let record = VectorRecord {
                id: chunk.id.clone(),
                vector,
                metadata: RecordMetadata {
                    source: chunk.source_path.clone(),
                    content: chunk.text.clone(),
                },
            };
            match store.insert(collection, record).await {
                Ok(()) => report.vectors_stored += 1,
                Err(e) => report.errors.push(format!("{}: {e}", chunk.id)),
            }
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            stored = report.vectors_stored,
            failed = report.embed_failures,
            duration_ms = report.duration_ms,
            "vector store populated"
        );
        report
    }
}
