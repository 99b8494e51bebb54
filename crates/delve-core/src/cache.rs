//! Bounded answer cache keyed by the exact query string.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use delve_memory::Chunk;
use moka::sync::Cache;

/// Timing breakdown of one answered query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryMetrics {
    pub search_time: Duration,
    pub llm_time: Duration,
    pub total_time: Duration,
}

impl fmt::Display for QueryMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "search {:.2}s | llm {:.2}s | total {:.2}s",
            self.search_time.as_secs_f64(),
            self.llm_time.as_secs_f64(),
            self.total_time.as_secs_f64()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub answer: String,
    pub metrics: QueryMetrics,
    pub sources: Vec<Arc<Chunk>>,
}

/// Last-write-wins map from query string to its most recent answer.
///
/// Capacity-bounded with TinyLFU eviction; entries optionally expire after `ttl`.
pub struct QueryCache {
    cache: Cache<String, Arc<CacheEntry>>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
        }
    }

    #[must_use]
    pub fn get(&self, query: &str) -> Option<Arc<CacheEntry>> {
        self.cache.get(query)
    }

    /// Store `entry` under `query`, replacing any earlier answer.
    pub fn insert(&self, query: impl Into<String>, entry: CacheEntry) {
        self.cache.insert(query.into(), Arc::new(entry));
    }

    /// Approximate number of live entries.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
