//! Stampede protection
//!
//! Collapses concurrent recomputation of the same missing key into a single
//! call whose result every waiter shares.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{Cache, Ttl};

type Call<V, E> = Arc<OnceCell<Result<V, E>>>;

// == Flight Group ==
/// Registry of in-flight computations, keyed by cache key.
///
/// A group is scoped to whoever owns it, normally one per cache or keyspace:
/// two caches with separate groups never coalesce on a shared key string.
/// Share one group between caches only when that is wanted.
pub struct FlightGroup<V, E> {
    calls: Mutex<HashMap<String, Call<V, E>>>,
}

impl<V, E> Default for FlightGroup<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> fmt::Debug for FlightGroup<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightGroup")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

impl<V, E> FlightGroup<V, E> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently being computed.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn join<'a>(&'a self, key: &'a str) -> Registration<'a, V, E> {
        let mut calls = self.calls.lock();
        let call = Arc::clone(calls.entry(key.to_owned()).or_default());
        Registration {
            group: self,
            key,
            call,
        }
    }

    /// Drops the registry entry for `key` once its call has a result, or once
    /// nobody but the registry and the departing caller still holds it.
    fn release(&self, key: &str, call: &Call<V, E>) {
        let mut calls = self.calls.lock();
        let Some(current) = calls.get(key) else {
            return;
        };
        if !Arc::ptr_eq(current, call) {
            return;
        }
        // Clones are only taken under this lock, so the count is stable here.
        if call.initialized() || Arc::strong_count(call) <= 2 {
            calls.remove(key);
        }
    }
}

/// A caller's stake in an in-flight call. Released on drop, so a cancelled
/// caller never leaves its key behind.
struct Registration<'a, V, E> {
    group: &'a FlightGroup<V, E>,
    key: &'a str,
    call: Call<V, E>,
}

impl<V, E> Drop for Registration<'_, V, E> {
    fn drop(&mut self) {
        self.group.release(self.key, &self.call);
    }
}

impl<V, E> FlightGroup<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone,
{
    /// Returns the cached value for `key`, computing and caching it on a miss.
    ///
    /// On a hit no coordination happens. On a miss the first caller for the
    /// key runs `compute`; concurrent callers wait and receive the same
    /// `Ok`/`Err`. A successful value is written with the TTL `compute`
    /// returned, best effort: a failed write is logged and the value is still
    /// returned. Errors from `compute` are never cached.
    ///
    /// A small window between the first lookup and joining the group means a
    /// second computation is possible, but rare. If the computing caller is
    /// cancelled, a waiting caller takes over; if nobody is waiting, the key
    /// is dropped from the group.
    pub async fn get_or_set<C, F, Fut>(&self, cache: &C, key: &str, compute: F) -> Result<V, E>
    where
        C: Cache<V> + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, Ttl), E>>,
    {
        if let Some(value) = lookup(cache, key).await {
            return Ok(value);
        }

        let registration = self.join(key);
        let result = registration
            .call
            .get_or_init(|| async {
                if let Some(value) = lookup(cache, key).await {
                    return Ok(value);
                }

                debug!("Computing missing cache key {:?}", key);
                let (value, ttl) = compute().await?;
                if let Err(e) = cache.set(key, value.clone(), ttl).await {
                    warn!("Failed to cache computed value for {:?}: {}", key, e);
                }
                Ok(value)
            })
            .await
            .clone();
        result
    }
}

/// Fast-path read. Any error counts as a miss.
async fn lookup<V, C>(cache: &C, key: &str) -> Option<V>
where
    C: Cache<V> + ?Sized,
{
    match cache.get(key).await {
        Ok(value) => Some(value),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            debug!("Cache read for {:?} failed, treating as miss: {}", key, e);
            None
        }
    }
}

/// Free-function form of [`FlightGroup::get_or_set`].
///
/// ```
/// # use kvcache::cache::{get_or_set, FlightGroup, MemoryCache, MemoryOptions, Ttl};
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() {
/// let cache = MemoryCache::new(MemoryOptions::new().cleanup_interval(Duration::ZERO));
/// let group: FlightGroup<u64, String> = FlightGroup::new();
///
/// let value = get_or_set(&cache, &group, "answer", || async {
///     Ok::<_, String>((42, Ttl::After(Duration::from_secs(60))))
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(value, 42);
/// assert_eq!(cache.get("answer").unwrap(), 42);
/// # }
/// ```
pub async fn get_or_set<C, V, E, F, Fut>(
    cache: &C,
    group: &FlightGroup<V, E>,
    key: &str,
    compute: F,
) -> Result<V, E>
where
    C: Cache<V> + ?Sized,
    V: Clone + Send + Sync + 'static,
    E: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(V, Ttl), E>>,
{
    group.get_or_set(cache, key, compute).await
}
