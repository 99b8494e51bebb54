mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file, apply `DELVE_*` overrides, and validate.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if the resulting
    /// configuration is invalid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.llm.base_url.starts_with("http://") || self.llm.base_url.starts_with("https://"))
        {
            bail!("llm.base_url must start with http:// or https://");
        }
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be greater than 0");
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            bail!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        if self.retrieval.final_k == 0 {
            bail!("retrieval.final_k must be greater than 0");
        }
        if self.cache.capacity == 0 {
            bail!("cache.capacity must be greater than 0");
        }
        if self.vector_store.vector_dim == 0 {
            bail!("vector_store.vector_dim must be greater than 0");
        }
        if self.rerank.provider == RerankProvider::CrossEncoder && self.rerank.model.is_empty() {
            bail!("rerank.model must not be empty when rerank.provider = \"cross-encoder\"");
        }
        if self.rerank.provider == RerankProvider::Tei && self.rerank.url.is_none() {
            bail!("rerank.url is required when rerank.provider = \"tei\"");
        }
        Ok(())
    }
}
