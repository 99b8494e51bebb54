//! ONNX cross-encoder scoring via fastembed's `TextRerank`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};

use super::CrossEncoder;
use crate::error::{IndexError, Result};

/// Map a configured model name onto a fastembed reranker.
///
/// # Errors
///
/// Returns [`IndexError::Rerank`] for names fastembed does not ship.
pub fn reranker_model(name: &str) -> Result<RerankerModel> {
    match name.to_lowercase().as_str() {
        "bge-reranker-base" => Ok(RerankerModel::BGERerankerBase),
        "bge-reranker-v2-m3" => Ok(RerankerModel::BGERerankerV2M3),
        "jina-reranker-v1-turbo-en" => Ok(RerankerModel::JINARerankerV1TurboEn),
        other => Err(IndexError::Rerank(format!(
            "unknown cross-encoder model '{other}', expected one of: bge-reranker-base, \
             bge-reranker-v2-m3, jina-reranker-v1-turbo-en"
        ))),
    }
}

/// Scores every `(query, text)` pair jointly with a local cross-encoder model.
///
/// Inference runs on the blocking pool. The model is shared by clones.
#[derive(Clone)]
pub struct FastembedCrossEncoder {
    model: Arc<Mutex<TextRerank>>,
    name: String,
}

impl std::fmt::Debug for FastembedCrossEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastembedCrossEncoder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FastembedCrossEncoder {
    /// Load `name`, downloading it into `cache_dir` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Rerank`] if the name is unknown or the model cannot be fetched or
    /// initialised.
    pub async fn load(name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let kind = reranker_model(name)?;
        let model = tokio::task::spawn_blocking(move || {
            let mut options = RerankInitOptions::new(kind).with_show_download_progress(false);
            if let Some(dir) = cache_dir {
                options = options.with_cache_dir(dir);
            }
            TextRerank::try_new(options)
        })
        .await
        .map_err(|e| IndexError::Rerank(format!("model loader task failed: {e}")))?
        .map_err(|e| IndexError::Rerank(format!("failed to load cross-encoder {name}: {e}")))?;

        tracing::info!(model = name, "cross-encoder loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            name: name.to_owned(),
        })
    }
}

impl CrossEncoder for FastembedCrossEncoder {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let query = query.to_owned();
        let documents: Vec<String> = texts.iter().map(|t| (*t).to_owned()).collect();
        let count = documents.len();

        let ranked = tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| IndexError::Rerank("cross-encoder lock poisoned".into()))?;
            let model: &mut TextRerank = &mut guard;
            let documents: Vec<&str> = documents.iter().map(String::as_str).collect();
            model
                .rerank(query.as_str(), &documents, false, None)
                .map_err(|e| IndexError::Rerank(e.to_string()))
        })
        .await
        .map_err(|e| IndexError::Rerank(format!("rerank task failed: {e}")))??;

        let mut scores = vec![f32::NEG_INFINITY; count];
        for item in ranked {
            let slot = scores.get_mut(item.index).ok_or_else(|| {
                IndexError::Rerank(format!("index {} out of range", item.index))
            })?;
            *slot = item.score;
        }
        Ok(scores)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
