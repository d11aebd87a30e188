//! Fixed-window counter records and admission results.

use serde::{Deserialize, Serialize};

/// One fixed window for one (tier, identifier) pair.
///
/// Stored as the payload of a cache entry whose own expiry tracks
/// `reset_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterRecord {
    /// Calls seen in this window, including rejected ones
    pub count: u32,
    /// Window end in epoch milliseconds
    pub reset_time: u64,
}

impl CounterRecord {
    /// Start a new window at `now_ms`.
    pub fn open(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            reset_time: now_ms.saturating_add(window_ms),
        }
    }

    /// A call landing after `reset_time` starts a new window.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.reset_time < now_ms
    }

    /// Milliseconds left in this window.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.reset_time.saturating_sub(now_ms)
    }
}

/// Outcome of an admitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResult {
    /// Calls allowed per window
    pub limit: u32,
    /// Calls left in the current window
    pub remaining: u32,
    /// Window reset time in epoch milliseconds
    pub reset: u64,
}

/// Round milliseconds up to whole seconds.
pub(crate) fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}
