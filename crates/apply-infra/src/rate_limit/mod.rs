//! Rate limiting - window store backends and the two-tier limiter.

mod file;
mod limiter;
mod memory;

pub use file::FileWindowStore;
pub use limiter::{RateCheck, RateLimitPolicy, RateLimiter, TierOutcome};
pub use memory::InMemoryWindowStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisWindowStore};
