//! Memory Engine Module
//!
//! Bounded in-process cache combining a key index with an LRU list and TTL
//! expiration, swept in the background by the janitor task.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use tokio::runtime::Handle;
use tracing::{info, warn};

use super::{Cache, CacheStats, Entry, LruList, Ttl};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_janitor, Janitor, Sweep};

/// Callback invoked with every removed key/value pair.
pub type EvictionCallback<V> = Arc<dyn Fn(&str, &V, EvictionReason) + Send + Sync>;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Dropped from the back of the LRU list to make room
    Capacity,
    /// TTL elapsed, noticed on access or by the sweeper
    Expired,
    /// Removed by `delete`
    Deleted,
    /// Removed by `clear`
    Cleared,
}

/// When eviction callbacks run relative to the engine lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionMode {
    /// Run while the lock is held. The callback must be fast and must never
    /// call back into the same cache, which would deadlock.
    #[default]
    Inline,
    /// Queue removals during the operation and run the callback after the
    /// lock is released. The callback may use the cache.
    Deferred,
}

// == Memory Options ==
/// Construction parameters for [`MemoryCache`].
#[derive(Debug, Clone)]
pub struct MemoryOptions {
    /// TTL applied for [`Ttl::Default`]; zero means no expiration
    pub default_ttl: Duration,
    /// Sweeper period; zero disables the sweeper (lazy expiry only)
    pub cleanup_interval: Duration,
    /// Maximum number of entries; zero means unbounded
    pub max_entries: usize,
    /// When eviction callbacks run
    pub eviction_mode: EvictionMode,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            default_ttl: Duration::ZERO,
            cleanup_interval: Duration::from_secs(1),
            max_entries: 0,
            eviction_mode: EvictionMode::Inline,
        }
    }
}

impl MemoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn eviction_mode(mut self, mode: EvictionMode) -> Self {
        self.eviction_mode = mode;
        self
    }
}

type Removed<V> = Vec<(Entry<V>, EvictionReason)>;

// == Locked State ==
struct State<V> {
    index: HashMap<String, usize>,
    order: LruList<V>,
    stats: CacheStats,
    closed: bool,
    on_evict: Option<EvictionCallback<V>>,
}

impl<V> State<V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            order: LruList::new(),
            stats: CacheStats::new(),
            closed: false,
            on_evict: None,
        }
    }

    /// Removes a node from both the list and the index.
    fn unlink(&mut self, idx: usize) -> Entry<V> {
        let entry = self.order.remove(idx);
        self.index.remove(&entry.key);
        self.stats.set_total_entries(self.index.len());
        entry
    }

    /// Full back-to-front pass. Expiry order is unrelated to recency, so the
    /// whole list is visited.
    fn purge_expired(&mut self, now: Instant) -> Removed<V> {
        let mut removed = Vec::new();
        let mut cursor = self.order.back();
        while let Some(idx) = cursor {
            cursor = self.order.prev(idx);
            if self.order.get(idx).is_expired_at(now) {
                removed.push((self.unlink(idx), EvictionReason::Expired));
            }
        }
        self.stats.record_expirations(removed.len());
        removed
    }
}

struct Inner<V> {
    state: Mutex<State<V>>,
    options: MemoryOptions,
    janitor: Mutex<Option<Janitor>>,
}

impl<V> Inner<V> {
    /// Hands removed entries to the eviction callback, then releases the lock.
    fn release(&self, state: MutexGuard<'_, State<V>>, removed: Removed<V>) {
        if removed.is_empty() {
            return;
        }
        let Some(callback) = state.on_evict.clone() else {
            return;
        };

        match self.options.eviction_mode {
            EvictionMode::Inline => {
                for (entry, reason) in &removed {
                    callback(&entry.key, &entry.value, *reason);
                }
                drop(state);
            }
            EvictionMode::Deferred => {
                drop(state);
                for (entry, reason) in &removed {
                    callback(&entry.key, &entry.value, *reason);
                }
            }
        }
    }
}

impl<V: Send + 'static> Sweep for Inner<V> {
    fn sweep(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.purge_expired(Instant::now());
        let count = removed.len();
        self.release(state, removed);
        count
    }
}

// == Memory Cache ==
/// Bounded, TTL-aware, LRU-evicting in-process cache.
///
/// A single mutex guards the index and the list, and every operation holds it
/// for its whole duration. `get` refreshes recency, so even hits take the lock
/// exclusively. Values are stored as-is and cloned out on `get`.
///
/// Handles are cheap to clone and share the same storage.
///
/// ```
/// # use kvcache::cache::{MemoryCache, MemoryOptions, Ttl};
/// # use std::time::Duration;
/// let cache = MemoryCache::new(
///     MemoryOptions::new()
///         .max_entries(2)
///         .cleanup_interval(Duration::ZERO),
/// );
///
/// cache.set("a", 1, Ttl::Default).unwrap();
/// cache.set("b", 2, Ttl::Default).unwrap();
/// cache.set("c", 3, Ttl::Default).unwrap();
///
/// assert!(cache.get("a").is_err());
/// assert_eq!(cache.get("c").unwrap(), 3);
/// ```
pub struct MemoryCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MemoryCache")
            .field("len", &state.index.len())
            .field("closed", &state.closed)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl<V: Send + 'static> MemoryCache<V> {
    // == Constructor ==
    /// Creates a cache and, when `cleanup_interval` is non-zero, starts the
    /// sweeper on the current tokio runtime.
    ///
    /// Without a runtime the sweeper is skipped and expired entries are only
    /// dropped when accessed.
    pub fn new(options: MemoryOptions) -> Self {
        let every = options.cleanup_interval;
        let inner = Arc::new(Inner {
            state: Mutex::new(State::new()),
            options,
            janitor: Mutex::new(None),
        });

        if !every.is_zero() {
            match Handle::try_current() {
                Ok(runtime) => {
                    let janitor = spawn_janitor(&runtime, Arc::downgrade(&inner), every);
                    *inner.janitor.lock() = Some(janitor);
                }
                Err(_) => {
                    warn!("No tokio runtime available, TTL cleanup task disabled");
                }
            }
        }

        Self { inner }
    }

    /// Registers the eviction callback, replacing any previous one.
    ///
    /// Fires once for every removal: capacity eviction, delete, expiry and
    /// clear. See [`EvictionMode`] for when it runs relative to the lock.
    pub fn on_evict<F>(&self, callback: F)
    where
        F: Fn(&str, &V, EvictionReason) + Send + Sync + 'static,
    {
        self.inner.state.lock().on_evict = Some(Arc::new(callback));
    }

    // == Get ==
    /// Returns a clone of the value and marks the key most recently used.
    ///
    /// An expired entry is removed (firing the callback) and reported as
    /// not found. Works after `close`.
    pub fn get(&self, key: &str) -> Result<V>
    where
        V: Clone,
    {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let Some(idx) = state.index.get(key).copied() else {
            state.stats.record_miss();
            return Err(CacheError::NotFound);
        };

        if state.order.get(idx).is_expired() {
            let entry = state.unlink(idx);
            state.stats.record_expirations(1);
            state.stats.record_miss();
            self.inner
                .release(guard, vec![(entry, EvictionReason::Expired)]);
            return Err(CacheError::NotFound);
        }

        state.order.move_to_front(idx);
        state.stats.record_hit();
        Ok(state.order.get(idx).value.clone())
    }

    // == Set ==
    /// Stores a value.
    ///
    /// Overwriting an existing key replaces value and expiration in place and
    /// refreshes recency without evicting anything. A new key on a full cache
    /// first evicts the least recently used entry.
    pub fn set(&self, key: &str, value: V, ttl: Ttl) -> Result<()> {
        let ttl = ttl.resolve(self.inner.options.default_ttl);
        let max_entries = self.inner.options.max_entries;

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(CacheError::Closed);
        }

        if let Some(idx) = state.index.get(key).copied() {
            state.order.get_mut(idx).refresh(value, ttl);
            state.order.move_to_front(idx);
            return Ok(());
        }

        let mut removed = Vec::new();
        if max_entries > 0 && state.index.len() >= max_entries {
            if let Some(entry) = state.order.pop_back() {
                state.index.remove(&entry.key);
                state.stats.record_eviction();
                removed.push((entry, EvictionReason::Capacity));
            }
        }

        let idx = state.order.push_front(Entry::new(key.to_owned(), value, ttl));
        state.index.insert(key.to_owned(), idx);
        state.stats.set_total_entries(state.index.len());

        self.inner.release(guard, removed);
        Ok(())
    }

    // == Delete ==
    /// Removes a key. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(CacheError::Closed);
        }

        let removed = match state.index.get(key).copied() {
            Some(idx) => vec![(state.unlink(idx), EvictionReason::Deleted)],
            None => Vec::new(),
        };

        self.inner.release(guard, removed);
        Ok(())
    }

    // == Has ==
    /// Reports whether a live entry exists, without touching recency.
    ///
    /// An expired entry found here is removed like on `get`.
    pub fn has(&self, key: &str) -> bool {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let Some(idx) = state.index.get(key).copied() else {
            return false;
        };
        if !state.order.get(idx).is_expired() {
            return true;
        }

        let entry = state.unlink(idx);
        state.stats.record_expirations(1);
        self.inner
            .release(guard, vec![(entry, EvictionReason::Expired)]);
        false
    }

    // == Clear ==
    /// Removes every entry, firing the callback for each one.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(CacheError::Closed);
        }

        state.index.clear();
        state.stats.set_total_entries(0);
        let removed = state
            .order
            .drain()
            .into_iter()
            .map(|entry| (entry, EvictionReason::Cleared))
            .collect();

        self.inner.release(guard, removed);
        Ok(())
    }

    // == Cleanup Expired ==
    /// Runs one sweeper pass now and returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.sweep()
    }

    // == Close ==
    /// Marks the cache closed and stops the sweeper, waiting for it to exit.
    ///
    /// Idempotent. Afterwards `set`, `delete` and `clear` fail with
    /// [`CacheError::Closed`] while `get` and `has` keep serving the frozen,
    /// no longer swept contents.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
        }

        let janitor = self.inner.janitor.lock().take();
        if let Some(janitor) = janitor {
            janitor.shutdown().await;
        }

        info!("Memory cache closed");
        Ok(())
    }
}

impl<V> MemoryCache<V> {
    // == Length ==
    /// Returns the current number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.inner.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.index.len());
        stats
    }

    /// Keys ordered from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        state.order.keys().into_iter().map(str::to_owned).collect()
    }

    pub fn options(&self) -> &MemoryOptions {
        &self.inner.options
    }
}

#[async_trait]
impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V> {
        MemoryCache::get(self, key)
    }

    async fn set(&self, key: &str, value: V, ttl: Ttl) -> Result<()> {
        MemoryCache::set(self, key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        MemoryCache::delete(self, key)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(MemoryCache::has(self, key))
    }

    async fn clear(&self) -> Result<()> {
        MemoryCache::clear(self)
    }

    async fn close(&self) -> Result<()> {
        MemoryCache::close(self).await
    }
}
