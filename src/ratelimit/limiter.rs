//! Core fixed-window rate limiter.

use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::counter::{ceil_secs, CounterRecord, RateLimitResult};
use super::tier::TierConfig;
use crate::cache::TtlCache;
use crate::error::RateLimitExceeded;

/// Per-identifier fixed-window admission control for one tier.
///
/// Counters live in a cache shared with the other tiers; keys are namespaced
/// as `<key_prefix>:<identifier>`. The read-increment-write of [`check`]
/// runs under the cache lock, so concurrent calls for one identifier never
/// lose an increment.
///
/// [`check`]: RateLimiter::check
pub struct RateLimiter {
    /// Shared counter store
    cache: Arc<TtlCache<CounterRecord>>,
    /// Namespace for this limiter's cache keys
    key_prefix: String,
    /// Window length and call ceiling
    config: TierConfig,
}

enum Admission {
    Opened(CounterRecord),
    Counted(CounterRecord, u64),
}

impl RateLimiter {
    /// Create a limiter storing its counters in `cache`.
    pub fn new(
        cache: Arc<TtlCache<CounterRecord>>,
        key_prefix: impl Into<String>,
        config: TierConfig,
    ) -> Self {
        Self {
            cache,
            key_prefix: key_prefix.into(),
            config,
        }
    }

    /// Cache key holding the counter for `identifier`.
    pub fn cache_key(&self, identifier: &str) -> String {
        format!("{}:{}", self.key_prefix, identifier)
    }

    /// Count a call from `identifier` and decide whether to admit it.
    ///
    /// A rejected call still counts toward the window, so wasted calls do not
    /// shorten the penalty.
    pub fn check(&self, identifier: &str) -> Result<RateLimitResult, RateLimitExceeded> {
        let key = self.cache_key(identifier);
        let TierConfig { window_ms, max } = self.config;

        trace!(key = %key, "Checking rate limit");

        let admission = self.cache.compute(&key, |current, now| match current {
            Some(record) if !record.is_expired(now) => {
                // Saturate one past the ceiling: the window is exhausted either way.
                let next = CounterRecord {
                    count: record.count.saturating_add(1).min(max.saturating_add(1)),
                    reset_time: record.reset_time,
                };
                let ttl = ceil_secs(next.remaining_ms(now)).max(1);
                (next, Some(ttl), Admission::Counted(next, now))
            }
            _ => {
                let record = CounterRecord::open(now, window_ms);
                let ttl = ceil_secs(window_ms).max(1);
                (record, Some(ttl), Admission::Opened(record))
            }
        });

        match admission {
            Admission::Opened(record) => {
                debug!(
                    key = %key,
                    limit = max,
                    reset = record.reset_time,
                    "Opened rate limit window"
                );
                Ok(RateLimitResult {
                    limit: max,
                    remaining: max.saturating_sub(1),
                    reset: record.reset_time,
                })
            }
            Admission::Counted(record, now) if record.count > max => {
                let retry_after_seconds = ceil_secs(record.remaining_ms(now));
                warn!(
                    tier = %self.key_prefix,
                    key = %key,
                    retry_after = retry_after_seconds,
                    "Rate limit exceeded"
                );
                Err(RateLimitExceeded {
                    retry_after_seconds,
                    limit: max,
                    remaining: 0,
                    reset: record.reset_time,
                })
            }
            Admission::Counted(record, _) => Ok(RateLimitResult {
                limit: max,
                remaining: max - record.count,
                reset: record.reset_time,
            }),
        }
    }

    /// Current counter for `identifier`, if a window is open.
    ///
    /// Counts as a cache lookup.
    pub fn counter(&self, identifier: &str) -> Option<CounterRecord> {
        self.cache.get(&self.cache_key(identifier))
    }

    /// Forget the counter for `identifier`.
    pub fn reset(&self, identifier: &str) -> bool {
        self.cache.delete(&self.cache_key(identifier)) > 0
    }
}
