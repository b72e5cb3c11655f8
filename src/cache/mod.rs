//! Cache Module
//!
//! One [`Cache`] contract with two engines behind it: an in-process
//! [`MemoryCache`] with TTL expiration and LRU eviction, and a remote
//! [`RedisCache`]. [`get_or_set`] adds stampede protection on top of either.

mod entry;
mod flight;
mod lru;
mod marshal;
mod memory;
mod redis_cache;
mod stats;
mod ttl;


use async_trait::async_trait;

use crate::error::Result;

// Re-export public types
pub use entry::Entry;
pub use flight::{get_or_set, FlightGroup};
pub use lru::LruList;
pub use marshal::{JsonMarshaler, Marshaler};
pub use memory::{EvictionCallback, EvictionMode, EvictionReason, MemoryCache, MemoryOptions};
pub use redis_cache::{RedisCache, RedisOptions, DEFAULT_SCAN_BATCH};
pub use stats::CacheStats;
pub use ttl::Ttl;

// == Cache Trait ==
/// Contract shared by every cache engine.
///
/// Callers that need a deadline wrap the returned future in
/// `tokio::time::timeout`; engines add no timeout of their own.
#[async_trait]
pub trait Cache<V>: Send + Sync {
    /// Returns the value stored under `key`.
    ///
    /// Fails with [`CacheError::NotFound`](crate::error::CacheError::NotFound)
    /// when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<V>;

    /// Stores `value` under `key`, replacing any previous value and expiration.
    async fn set(&self, key: &str, value: V, ttl: Ttl) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns whether a live (non-expired) entry exists for `key`.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Removes every entry in this cache's namespace.
    async fn clear(&self) -> Result<()>;

    /// Releases engine-owned resources. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}
