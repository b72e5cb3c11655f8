//! Backend Selection
//!
//! Runtime choice between the two engines for the HTTP front-end.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::cache::{Cache, CacheStats, MemoryCache, RedisCache, Ttl};
use crate::config::{BackendKind, Config};
use crate::error::Result;

/// Cache engine chosen at startup, storing arbitrary JSON values.
#[derive(Debug, Clone)]
pub enum CacheBackend {
    Memory(MemoryCache<Value>),
    Redis(RedisCache<Value>),
}

impl CacheBackend {
    /// Builds the engine named by `config.backend`.
    ///
    /// The memory engine starts its sweeper on the current runtime; the redis
    /// engine connects eagerly so a bad URL fails at startup.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.backend {
            BackendKind::Memory => {
                let options = config.memory_options();
                info!(
                    "Using memory cache backend (max_entries={}, default_ttl={:?})",
                    options.max_entries, options.default_ttl
                );
                Ok(CacheBackend::Memory(MemoryCache::new(options)))
            }
            BackendKind::Redis => {
                let cache = RedisCache::connect(&config.redis_url, config.redis_options()).await?;
                Ok(CacheBackend::Redis(cache))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CacheBackend::Memory(_) => "memory",
            CacheBackend::Redis(_) => "redis",
        }
    }

    /// Local statistics; only the memory engine keeps them.
    pub fn stats(&self) -> Option<CacheStats> {
        match self {
            CacheBackend::Memory(cache) => Some(cache.stats()),
            CacheBackend::Redis(_) => None,
        }
    }
}

impl From<MemoryCache<Value>> for CacheBackend {
    fn from(cache: MemoryCache<Value>) -> Self {
        CacheBackend::Memory(cache)
    }
}

impl From<RedisCache<Value>> for CacheBackend {
    fn from(cache: RedisCache<Value>) -> Self {
        CacheBackend::Redis(cache)
    }
}

#[async_trait]
impl Cache<Value> for CacheBackend {
    async fn get(&self, key: &str) -> Result<Value> {
        match self {
            CacheBackend::Memory(cache) => cache.get(key),
            CacheBackend::Redis(cache) => Cache::get(cache, key).await,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Ttl) -> Result<()> {
        match self {
            CacheBackend::Memory(cache) => cache.set(key, value, ttl),
            CacheBackend::Redis(cache) => Cache::set(cache, key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            CacheBackend::Memory(cache) => cache.delete(key),
            CacheBackend::Redis(cache) => Cache::delete(cache, key).await,
        }
    }

    async fn has(&self, key: &str) -> Result<bool> {
        match self {
            CacheBackend::Memory(cache) => Ok(cache.has(key)),
            CacheBackend::Redis(cache) => Cache::has(cache, key).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            CacheBackend::Memory(cache) => cache.clear(),
            CacheBackend::Redis(cache) => Cache::clear(cache).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            CacheBackend::Memory(cache) => cache.close().await,
            CacheBackend::Redis(cache) => Cache::close(cache).await,
        }
    }
}
