//! kvcache - Generic key/value caching with interchangeable engines
//!
//! Provides a bounded in-process LRU/TTL cache and a Redis-backed cache behind
//! one [`Cache`](cache::Cache) contract, stampede protection on top of either,
//! and a small HTTP front-end that serves whichever engine is configured.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use backend::CacheBackend;
pub use cache::{
    get_or_set, Cache, FlightGroup, MemoryCache, MemoryOptions, RedisCache, RedisOptions, Ttl,
};
pub use config::Config;
pub use error::{CacheError, Result};
