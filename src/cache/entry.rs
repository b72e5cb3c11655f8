//! Cache Entry Module
//!
//! Defines the structure for individual memory-engine entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A single entry held by the memory engine.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// Key the entry is indexed under
    pub key: String,
    /// The stored value
    pub value: V,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` from now, or never when `ttl` is None.
    pub fn new(key: String, value: V, ttl: Option<Duration>) -> Self {
        Self {
            key,
            value,
            expires_at: deadline(ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// An entry is expired once `now` reaches its expiration instant, so a
    /// fully elapsed TTL is never served.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks if the entry has expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if no expiration is set.
    ///
    /// - `Some(Duration::ZERO)` once the entry has expired
    /// - `None` if the entry never expires
    #[cfg(test)]
    pub(crate) fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }

    /// Replaces value and expiration in place.
    pub(crate) fn refresh(&mut self, value: V, ttl: Option<Duration>) {
        self.value = value;
        self.expires_at = deadline(ttl);
    }
}

/// Expiration instant for `ttl` from now. A TTL too large for the clock to
/// represent is treated as no expiration.
fn deadline(ttl: Option<Duration>) -> Option<Instant> {
    ttl.and_then(|ttl| Instant::now().checked_add(ttl))
}
