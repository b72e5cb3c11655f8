//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{MemoryOptions, RedisOptions};

/// Which cache engine the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Memory,
    Redis,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "redis" => Ok(BackendKind::Redis),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache engine behind the HTTP front-end
    pub backend: BackendKind,
    /// Redis connection URL, used by the redis backend
    pub redis_url: String,
    /// Redis key namespace; empty stores keys unprefixed
    pub key_prefix: String,
    /// Default TTL in seconds for entries without explicit TTL (0 = never)
    pub default_ttl: u64,
    /// Background cleanup task interval in seconds (0 = disabled)
    pub cleanup_interval: u64,
    /// Maximum number of entries the memory cache can hold (0 = unbounded)
    pub max_entries: usize,
    /// HTTP server port
    pub server_port: u16,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory` or `redis` (default: memory)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379)
    /// - `KEY_PREFIX` - Redis key namespace (default: empty)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env_or("CACHE_BACKEND", defaults.backend),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: env::var("KEY_PREFIX").unwrap_or(defaults.key_prefix),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Options for the memory engine.
    pub fn memory_options(&self) -> MemoryOptions {
        MemoryOptions::new()
            .default_ttl(Duration::from_secs(self.default_ttl))
            .cleanup_interval(Duration::from_secs(self.cleanup_interval))
            .max_entries(self.max_entries)
    }

    /// Options for the redis engine.
    pub fn redis_options(&self) -> RedisOptions {
        RedisOptions::new()
            .prefix(self.key_prefix.clone())
            .default_ttl(Duration::from_secs(self.default_ttl))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
            default_ttl: 300,
            cleanup_interval: 1,
            max_entries: 1000,
            server_port: 3000,
        }
    }
}
