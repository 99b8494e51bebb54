use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub cache_hits: u64,
    pub degraded_answers: u64,
    pub errors: u64,
    pub last_search_ms: u64,
    pub last_llm_ms: u64,
    pub last_total_ms: u64,
    pub candidates_retrieved: u64,
    pub store_local: bool,
    pub provider_name: String,
    pub model_name: String,
}

pub struct MetricsCollector {
    tx: watch::Sender<MetricsSnapshot>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<MetricsSnapshot>) {
        let (tx, rx) = watch::channel(MetricsSnapshot::default());
        (Self { tx }, rx)
    }

    pub fn update(&self, f: impl FnOnce(&mut MetricsSnapshot)) {
        self.tx.send_modify(f);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.tx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_snapshot() {
        let m = MetricsSnapshot::default();
        assert_eq!(m.queries, 0);
        assert_eq!(m.cache_hits, 0);
        assert!(!m.store_local);
        assert!(m.provider_name.is_empty());
    }

    #[test]
    fn metrics_collector_update() {
        let (collector, rx) = MetricsCollector::new();
        collector.update(|m| {
            m.queries = 3;
            m.last_search_ms = 42;
        });
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.queries, 3);
        assert_eq!(snapshot.last_search_ms, 42);
    }

    #[test]
    fn metrics_collector_multiple_updates() {
        let (collector, rx) = MetricsCollector::new();
        collector.update(|m| m.errors = 1);
        collector.update(|m| m.errors += 1);
        assert_eq!(rx.borrow().errors, 2);
        assert_eq!(collector.snapshot().errors, 2);
    }

    #[test]
    fn updates_survive_dropped_receiver() {
        let (collector, rx) = MetricsCollector::new();
        drop(rx);
        collector.update(|m| m.cache_hits = 7);
        assert_eq!(collector.snapshot().cache_hits, 7);
    }
}
