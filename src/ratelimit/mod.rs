//! Rate limiting logic and state management.

mod counter;
mod limiter;
mod registry;
mod tier;

pub use counter::{CounterRecord, RateLimitResult};
pub use limiter::RateLimiter;
pub use registry::{RateLimitStats, RateLimiterRegistry};
pub use tier::{Tier, TierConfig, TierLimits, DEFAULT_WINDOW_MS};
