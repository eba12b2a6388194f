//! # Apply Infrastructure
//!
//! Concrete implementations of the ports defined in `apply-core`.
//! This crate contains the window store backends, the rate limiter that
//! composes them with identity hashing, and the HTTP provider client.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory and file stores only
//! - `redis` - Redis-backed window store shared across processes

pub mod identity;
pub mod provider;
pub mod rate_limit;

// Re-exports
pub use identity::IdentityHasher;
pub use provider::HttpProviderClient;
pub use rate_limit::{
    FileWindowStore, InMemoryWindowStore, RateCheck, RateLimitPolicy, RateLimiter, TierOutcome,
};

#[cfg(feature = "redis")]
pub use rate_limit::{RedisConfig, RedisWindowStore};
