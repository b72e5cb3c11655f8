//! Time-to-live selector passed to [`Cache::set`](super::Cache::set).

use std::time::Duration;

// == Ttl ==
/// How long a written entry stays alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the engine's configured default TTL.
    #[default]
    Default,
    /// The entry never expires.
    Never,
    /// The entry expires this long after the write.
    /// A zero duration behaves like [`Ttl::Default`].
    After(Duration),
}

impl Ttl {
    /// Maps a signed second count: positive expires after that many seconds,
    /// zero uses the default and negative never expires.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            s if s > 0 => Ttl::After(Duration::from_secs(s as u64)),
            0 => Ttl::Default,
            _ => Ttl::Never,
        }
    }

    /// Resolves against an engine default.
    ///
    /// Returns `None` for "no expiration". A zero `default` means entries
    /// written with [`Ttl::Default`] never expire.
    pub fn resolve(self, default: Duration) -> Option<Duration> {
        let effective = match self {
            Ttl::Never => return None,
            Ttl::After(d) if !d.is_zero() => d,
            Ttl::After(_) | Ttl::Default => default,
        };
        (!effective.is_zero()).then_some(effective)
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::After(duration)
    }
}
