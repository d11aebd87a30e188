//! Hit/miss accounting for the TTL cache.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookups that found a live value
    pub hits: u64,
    /// Lookups that found nothing, or only an expired value
    pub misses: u64,
    /// Number of live keys
    pub keys: usize,
    /// Hit percentage with two decimals, or `"0"` before any lookup
    pub hit_rate: String,
}

/// Process-wide hit/miss tally.
#[derive(Debug, Default)]
pub(crate) struct HitCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitCounters {
    pub(crate) fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, keys: usize) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        CacheStats {
            hits,
            misses,
            keys,
            hit_rate: format_hit_rate(hits, misses),
        }
    }
}

/// Format `hits / (hits + misses) * 100` with two decimals.
pub(crate) fn format_hit_rate(hits: u64, misses: u64) -> String {
    let total = hits + misses;
    if total == 0 {
        return "0".to_string();
    }
    format!("{:.2}", hits as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_without_lookups() {
        assert_eq!(format_hit_rate(0, 0), "0");
    }

    #[test]
    fn test_hit_rate_two_decimals() {
        assert_eq!(format_hit_rate(1, 0), "100.00");
        assert_eq!(format_hit_rate(1, 1), "50.00");
        assert_eq!(format_hit_rate(1, 2), "33.33");
        assert_eq!(format_hit_rate(2, 1), "66.67");
        assert_eq!(format_hit_rate(0, 5), "0.00");
    }

    #[test]
    fn test_counters_snapshot_and_reset() {
        let counters = HitCounters::default();
        counters.record(true);
        counters.record(true);
        counters.record(false);

        let stats = counters.snapshot(7);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.keys, 7);
        assert_eq!(stats.hit_rate, "66.67");

        counters.reset();
        assert_eq!(counters.snapshot(0).hit_rate, "0");
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = HitCounters::default().snapshot(0);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hitRate"], "0");
        assert_eq!(json["keys"], 0);
    }
}
