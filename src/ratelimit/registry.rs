//! The standing set of tier limiters over one shared cache.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::counter::{CounterRecord, RateLimitResult};
use super::limiter::RateLimiter;
use super::tier::{Tier, TierLimits};
use crate::cache::{CacheStats, TtlCache};
use crate::error::RateLimitExceeded;

/// Diagnostic snapshot of rate limiter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    /// Open windows across all tiers
    pub total_tracked_identifiers: usize,
    /// Statistics of the shared cache
    pub cache_stats: CacheStats,
}

/// Owns the shared counter cache and one limiter per tier.
///
/// Constructed once at startup and handed to request handlers through
/// application state.
pub struct RateLimiterRegistry {
    cache: Arc<TtlCache<CounterRecord>>,
    strict: RateLimiter,
    normal: RateLimiter,
    lenient: RateLimiter,
}

impl RateLimiterRegistry {
    /// Build the strict, normal and lenient limiters over `cache`.
    pub fn new(cache: Arc<TtlCache<CounterRecord>>, limits: TierLimits) -> Self {
        let build =
            |tier: Tier| RateLimiter::new(Arc::clone(&cache), tier.prefix(), limits.get(tier));

        let registry = Self {
            strict: build(Tier::Strict),
            normal: build(Tier::Normal),
            lenient: build(Tier::Lenient),
            cache: Arc::clone(&cache),
        };

        info!(
            strict_max = limits.strict.max,
            normal_max = limits.normal.max,
            lenient_max = limits.lenient.max,
            "Rate limiters initialized"
        );
        registry
    }

    /// The limiter for `tier`.
    pub fn limiter(&self, tier: Tier) -> &RateLimiter {
        match tier {
            Tier::Strict => &self.strict,
            Tier::Normal => &self.normal,
            Tier::Lenient => &self.lenient,
        }
    }

    /// The shared counter cache.
    pub fn cache(&self) -> &Arc<TtlCache<CounterRecord>> {
        &self.cache
    }

    /// Admit or reject a call from `identifier` under `tier`.
    pub fn check(
        &self,
        tier: Tier,
        identifier: &str,
    ) -> Result<RateLimitResult, RateLimitExceeded> {
        self.limiter(tier).check(identifier)
    }

    /// Forget `identifier`'s counters in every tier.
    ///
    /// Returns the number of counters removed.
    pub fn reset_identifier(&self, identifier: &str) -> usize {
        Tier::ALL
            .iter()
            .filter(|tier| self.limiter(**tier).reset(identifier))
            .count()
    }

    /// Drop every counter of `tier`. Returns the number removed.
    pub fn clear_tier(&self, tier: Tier) -> usize {
        let removed = self.cache.delete_by_pattern(&format!("{}:", tier.prefix()));
        info!(tier = %tier, removed = removed, "Cleared rate limit tier");
        removed
    }

    /// Open windows per tier plus shared cache statistics.
    pub fn stats(&self) -> RateLimitStats {
        let total_tracked_identifiers = self
            .cache
            .keys()
            .iter()
            .filter(|key| {
                Tier::ALL
                    .iter()
                    .any(|tier| key.starts_with(&format!("{}:", tier.prefix())))
            })
            .count();

        RateLimitStats {
            total_tracked_identifiers,
            cache_stats: self.cache.stats(),
        }
    }
}
