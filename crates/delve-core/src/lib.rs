//! Query pipeline tying hybrid retrieval to streamed generation, plus configuration, the
//! answer cache, and metrics.

pub mod cache;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod prompt;

pub use cache::{CacheEntry, QueryCache, QueryMetrics};
pub use config::Config;
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use pipeline::{
    Answer, AnswerChunk, AnswerStream, PipelineError, PipelineSettings, QueryPipeline,
};
