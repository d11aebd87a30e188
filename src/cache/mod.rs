//! In-process TTL cache shared by the rate limiters.

mod clock;
mod stats;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use stats::CacheStats;
pub use store::{
    CacheConfig, Expiration, SweeperHandle, TtlCache, DEFAULT_CHECK_PERIOD, DEFAULT_TTL,
};
