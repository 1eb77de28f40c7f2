//! Run statistics
//!
//! Counters are fire-and-forget: incrementing never blocks a chain, and the
//! coordinator does not read them back for decisions. Keys use slash paths
//! (`retry/count`, `retry/reason_count/503`).

use dashmap::DashMap;
use std::collections::BTreeMap;

/// Well-known counter keys
pub mod keys {
    pub const RETRY_COUNT: &str = "retry/count";
    pub const RETRY_MAX_REACHED: &str = "retry/max_reached";
    pub const DUPEFILTER_FILTERED: &str = "dupefilter/filtered";
    pub const REDIRECT_COUNT: &str = "redirect/count";
    pub const PAGES_DELIVERED: &str = "pages/delivered";
    pub const CHAINS_FAILED: &str = "chains/failed";

    /// Key for a per-reason retry counter
    pub fn retry_reason(reason: &str) -> String {
        format!("retry/reason_count/{}", reason)
    }
}

/// Concurrent counter map for one crawl run
#[derive(Debug, Default)]
pub struct StatsCollector {
    counters: DashMap<String, u64>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to a counter, creating it at zero first if needed
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Adds an arbitrary delta to a counter
    pub fn increment_by(&self, name: &str, by: u64) {
        *self.counters.entry(name.to_string()).or_insert(0) += by;
    }

    /// Current value of a counter; absent counters read as zero
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0)
    }

    /// Sorted snapshot of all counters, for end-of-run reporting
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_counter_reads_zero() {
        let stats = StatsCollector::new();
        assert_eq!(stats.get(keys::RETRY_COUNT), 0);
    }

    #[test]
    fn test_increment_accumulates() {
        let stats = StatsCollector::new();
        stats.increment(keys::RETRY_COUNT);
        stats.increment(keys::RETRY_COUNT);
        stats.increment_by(keys::DUPEFILTER_FILTERED, 3);

        assert_eq!(stats.get(keys::RETRY_COUNT), 2);
        assert_eq!(stats.get(keys::DUPEFILTER_FILTERED), 3);
    }

    #[test]
    fn test_reason_keys() {
        let stats = StatsCollector::new();
        stats.increment(&keys::retry_reason("503"));
        stats.increment(&keys::retry_reason("timeout"));

        assert_eq!(stats.get("retry/reason_count/503"), 1);
        assert_eq!(stats.get("retry/reason_count/timeout"), 1);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let stats = StatsCollector::new();
        stats.increment("b/two");
        stats.increment("a/one");

        let snapshot = stats.snapshot();
        let keys: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(keys, vec!["a/one".to_string(), "b/two".to_string()]);
    }

    #[test]
    fn test_concurrent_increments() {
        use std::sync::Arc;
        let stats = Arc::new(StatsCollector::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.increment("contested");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.get("contested"), 800);
    }
}
