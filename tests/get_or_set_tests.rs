//! Integration Tests for stampede-protected reads
//!
//! Exercises `get_or_set` through the public API against the memory engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kvcache::{get_or_set, Cache, CacheError, FlightGroup, MemoryCache, MemoryOptions, Ttl};
use tokio_test::{assert_err, assert_ok};

fn lazy_cache() -> Arc<MemoryCache<String>> {
    Arc::new(MemoryCache::new(
        MemoryOptions::new().cleanup_interval(Duration::ZERO),
    ))
}

#[tokio::test]
async fn test_concurrent_misses_compute_once() {
    let cache = lazy_cache();
    let group: Arc<FlightGroup<String, String>> = Arc::new(FlightGroup::new());
    let computations = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let (cache, group, computations) = (cache.clone(), group.clone(), computations.clone());
        handles.push(tokio::spawn(async move {
            get_or_set(cache.as_ref(), &group, "report", || async move {
                let n = computations.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok((format!("report-{}", n), Ttl::After(Duration::from_secs(60))))
            })
            .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(assert_ok!(assert_ok!(handle.await)));
    }

    assert!(
        computations.load(Ordering::SeqCst) <= 2,
        "expected at most one computation in practice, got {}",
        computations.load(Ordering::SeqCst)
    );
    assert!(results.iter().all(|r| r == &results[0]));
    assert_eq!(assert_ok!(cache.get("report")), results[0]);
    assert_eq!(group.in_flight(), 0);
}

#[tokio::test]
async fn test_concurrent_callers_share_error() {
    let cache = lazy_cache();
    let group: Arc<FlightGroup<String, String>> = Arc::new(FlightGroup::new());

    let calls = (0..5).map(|_| {
        let (cache, group) = (cache.clone(), group.clone());
        async move {
            get_or_set(cache.as_ref(), &group, "flaky", || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err::<(String, Ttl), _>("backend unavailable".to_string())
            })
            .await
        }
    });

    for result in spawn_all(calls).await {
        let err = assert_err!(result);
        assert_eq!(err, "backend unavailable");
    }
    assert!(matches!(cache.get("flaky"), Err(CacheError::NotFound)));
}

#[tokio::test]
async fn test_hit_returns_cached_value_through_trait_object() {
    let cache: Arc<dyn Cache<String>> = lazy_cache();
    let group: FlightGroup<String, String> = FlightGroup::new();
    assert_ok!(cache.set("cfg", "cached".to_string(), Ttl::Never).await);

    let value = assert_ok!(
        get_or_set(cache.as_ref(), &group, "cfg", || async {
            Ok(("computed".to_string(), Ttl::Default))
        })
        .await
    );

    assert_eq!(value, "cached");
}

#[tokio::test]
async fn test_expired_value_is_recomputed() {
    let cache = lazy_cache();
    let group: FlightGroup<String, String> = FlightGroup::new();
    let computations = AtomicUsize::new(0);

    for _ in 0..2 {
        assert_ok!(
            get_or_set(cache.as_ref(), &group, "short", || async {
                computations.fetch_add(1, Ordering::SeqCst);
                Ok(("v".to_string(), Ttl::After(Duration::from_millis(20))))
            })
            .await
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    assert_eq!(computations.load(Ordering::SeqCst), 2);
}

/// Spawns every future and collects the outputs in order.
async fn spawn_all<F>(futures: impl IntoIterator<Item = F>) -> Vec<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handles: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
    let mut outputs = Vec::with_capacity(handles.len());
    for handle in handles {
        outputs.push(assert_ok!(handle.await));
    }
    outputs
}
