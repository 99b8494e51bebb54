use super::{Config, RerankProvider};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DELVE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("DELVE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("DELVE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("DELVE_VECTOR_STORE_URL") {
            self.vector_store.url = v;
        }
        if let Ok(v) = std::env::var("DELVE_VECTOR_STORE_TOKEN") {
            self.vector_store.token = Some(v).filter(|t| !t.is_empty());
        }
        if let Ok(v) = std::env::var("DELVE_VECTOR_STORE_ENABLED") {
            if let Ok(enabled) = v.parse::<bool>() {
                self.vector_store.enabled = enabled;
            } else {
                tracing::warn!("ignoring invalid DELVE_VECTOR_STORE_ENABLED value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DELVE_RETRIEVAL_TOP_K") {
            if let Ok(n) = v.parse::<usize>() {
                self.retrieval.top_k = n;
            } else {
                tracing::warn!("ignoring invalid DELVE_RETRIEVAL_TOP_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DELVE_RETRIEVAL_FINAL_K") {
            if let Ok(n) = v.parse::<usize>() {
                self.retrieval.final_k = n;
            } else {
                tracing::warn!("ignoring invalid DELVE_RETRIEVAL_FINAL_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DELVE_RERANK_PROVIDER") {
            if let Ok(kind) =
                serde_json::from_value::<RerankProvider>(serde_json::Value::String(v.clone()))
            {
                self.rerank.provider = kind;
            } else {
                tracing::warn!("ignoring invalid DELVE_RERANK_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("DELVE_RERANK_MODEL") {
            self.rerank.model = v;
        }
        if let Ok(v) = std::env::var("DELVE_RERANK_URL") {
            self.rerank.url = Some(v);
        }
        if let Ok(v) = std::env::var("DELVE_CACHE_CAPACITY") {
            if let Ok(n) = v.parse::<u64>() {
                self.cache.capacity = n;
            } else {
                tracing::warn!("ignoring invalid DELVE_CACHE_CAPACITY value: {v}");
            }
        }
    }
}
