//! Redis Engine Module
//!
//! Thin adapter over a Redis connection. Values are encoded with a
//! [`Marshaler`] and keys are namespaced as `{prefix}:{key}`. Nothing is held
//! locally; the server is the only source of truth.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use super::{Cache, JsonMarshaler, Marshaler, Ttl};
use crate::error::{CacheError, Result};

/// Keys requested per `SCAN` round-trip during a prefixed clear.
pub const DEFAULT_SCAN_BATCH: usize = 100;

/// Largest `PX` sent to the server. Redis adds the current time in
/// milliseconds and rejects sums past `i64::MAX`.
const MAX_EXPIRY_MILLIS: u64 = (i64::MAX as u64) / 2;

// == Redis Options ==
/// Construction parameters for [`RedisCache`].
#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// Namespace; empty means keys are stored unprefixed
    pub prefix: String,
    /// TTL applied for [`Ttl::Default`]; zero means no expiration
    pub default_ttl: Duration,
    /// `COUNT` hint for each `SCAN` batch
    pub scan_batch: usize,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            default_ttl: Duration::ZERO,
            scan_batch: DEFAULT_SCAN_BATCH,
        }
    }
}

impl RedisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn scan_batch(mut self, batch: usize) -> Self {
        self.scan_batch = batch.max(1);
        self
    }

    /// `COUNT` actually sent; the server rejects zero.
    fn scan_count(&self) -> usize {
        self.scan_batch.max(1)
    }
}

// == Redis Cache ==
/// [`Cache`] backed by a Redis server.
///
/// Generic over the connection handle so both `ConnectionManager` and
/// `MultiplexedConnection` work. The handle's lifecycle belongs to whoever
/// created it: [`close`](Cache::close) is a no-op.
///
/// Every operation is one or more network round-trips. To bound one, wrap the
/// future in `tokio::time::timeout`; dropping it cancels the request. Backend
/// errors are returned as-is, with no retry.
pub struct RedisCache<V, C = ConnectionManager, M = JsonMarshaler<V>> {
    conn: C,
    marshaler: M,
    options: RedisOptions,
    _value: PhantomData<fn() -> V>,
}

impl<V, C: Clone, M: Clone> Clone for RedisCache<V, C, M> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            marshaler: self.marshaler.clone(),
            options: self.options.clone(),
            _value: PhantomData,
        }
    }
}

impl<V, C, M> fmt::Debug for RedisCache<V, C, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("options", &self.options)
            .finish()
    }
}

impl<V> RedisCache<V, ConnectionManager, JsonMarshaler<V>> {
    /// Opens a managed connection to `url` and wraps it with the JSON codec.
    pub async fn connect(url: &str, options: RedisOptions) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis cache backend (prefix={:?})", options.prefix);
        Ok(Self::new(conn, options))
    }
}

impl<V, C> RedisCache<V, C, JsonMarshaler<V>> {
    /// Wraps a connected handle using the JSON codec.
    pub fn new(conn: C, options: RedisOptions) -> Self {
        Self::with_marshaler(conn, JsonMarshaler::new(), options)
    }
}

impl<V, C, M> RedisCache<V, C, M> {
    /// Wraps a connected handle using a custom codec.
    pub fn with_marshaler(conn: C, marshaler: M, options: RedisOptions) -> Self {
        Self {
            conn,
            marshaler,
            options,
            _value: PhantomData,
        }
    }

    pub fn options(&self) -> &RedisOptions {
        &self.options
    }

    /// Full server-side key for `key`.
    pub fn storage_key(&self, key: &str) -> String {
        namespaced(&self.options.prefix, key)
    }
}

fn namespaced(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{}:{}", prefix, key)
    }
}

/// `SCAN MATCH` pattern covering every key under `prefix`, with glob
/// metacharacters in the prefix escaped.
fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 2);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(":*");
    pattern
}

/// Expiration in whole milliseconds, never rounded down to zero. `None` when
/// the TTL is too large for the server, which is stored without expiry.
fn expiry_millis(ttl: Duration) -> Option<u64> {
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
    (millis <= MAX_EXPIRY_MILLIS).then_some(millis)
}

impl<V, C, M> RedisCache<V, C, M>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    /// Deletes every key under the prefix in `SCAN` batches. Not atomic:
    /// keys written concurrently may survive.
    async fn clear_prefixed(&self) -> Result<usize> {
        let pattern = scan_pattern(&self.options.prefix);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.options.scan_count())
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let _: () = conn.del(&keys).await?;
                removed += keys.len();
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl<V, C, M> Cache<V> for RedisCache<V, C, M>
where
    V: Send + Sync + 'static,
    C: ConnectionLike + Clone + Send + Sync + 'static,
    M: Marshaler<V> + 'static,
{
    async fn get(&self, key: &str) -> Result<V> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn.get(self.storage_key(key)).await?;
        match raw {
            Some(bytes) => self.marshaler.unmarshal(&bytes),
            None => Err(CacheError::NotFound),
        }
    }

    async fn set(&self, key: &str, value: V, ttl: Ttl) -> Result<()> {
        let bytes = self.marshaler.marshal(&value)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.storage_key(key)).arg(bytes);
        if let Some(millis) = ttl
            .resolve(self.options.default_ttl)
            .and_then(expiry_millis)
        {
            cmd.arg("PX").arg(millis);
        }

        let mut conn = self.conn.clone();
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.storage_key(key)).await?;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(self.storage_key(key)).await?;
        Ok(exists)
    }

    /// Without a prefix this flushes the whole database, including keys that
    /// belong to other applications sharing it.
    async fn clear(&self) -> Result<()> {
        if self.options.prefix.is_empty() {
            warn!("Clearing unprefixed Redis cache: flushing the entire database");
            let mut conn = self.conn.clone();
            let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
            return Ok(());
        }

        let removed = self.clear_prefixed().await?;
        debug!(
            "Cleared {} keys under prefix {:?}",
            removed, self.options.prefix
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_keys() {
        assert_eq!(namespaced("app", "user:1"), "app:user:1");
        assert_eq!(namespaced("", "user:1"), "user:1");
    }

    #[test]
    fn test_scan_pattern_plain_prefix() {
        assert_eq!(scan_pattern("sessions"), "sessions:*");
    }

    #[test]
    fn test_scan_pattern_escapes_glob_chars() {
        assert_eq!(scan_pattern("a*b?"), "a\\*b\\?:*");
        assert_eq!(scan_pattern("[v1]"), "\\[v1\\]:*");
    }

    #[test]
    fn test_expiry_millis_rounding() {
        assert_eq!(expiry_millis(Duration::from_millis(100)), Some(100));
        assert_eq!(expiry_millis(Duration::from_micros(10)), Some(1));
        assert_eq!(expiry_millis(Duration::from_secs(2)), Some(2000));
    }

    #[test]
    fn test_expiry_millis_too_large_means_no_expiry() {
        assert_eq!(expiry_millis(Duration::MAX), None);
        assert_eq!(expiry_millis(Duration::from_secs(i64::MAX as u64)), None);
        assert_eq!(
            expiry_millis(Duration::from_millis(MAX_EXPIRY_MILLIS)),
            Some(MAX_EXPIRY_MILLIS)
        );
    }

    #[test]
    fn test_options_builder() {
        let options = RedisOptions::new()
            .prefix("flags")
            .default_ttl(Duration::from_secs(30))
            .scan_batch(0);

        assert_eq!(options.prefix, "flags");
        assert_eq!(options.default_ttl, Duration::from_secs(30));
        assert_eq!(options.scan_batch, 1);
    }

    #[test]
    fn test_zero_scan_batch_field_is_clamped() {
        let options = RedisOptions {
            scan_batch: 0,
            ..RedisOptions::default()
        };

        assert_eq!(options.scan_count(), 1);
        assert_eq!(RedisOptions::default().scan_count(), DEFAULT_SCAN_BATCH);
    }
}
