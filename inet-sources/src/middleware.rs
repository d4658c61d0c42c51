//! Caching and throttling wrappers around any [`RegistrySearch`].
//!
//! Stack order matters: a cache hit never waits on the throttle, so the cache
//! goes outermost. [`build_registry_stack`] composes them that way.
use async_trait::async_trait;
use dashmap::DashMap;
use inet_http::HttpError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::{sleep_until, Instant};

use crate::registry::{QueryKind, RegistryQuery, RegistrySearch, ResultRange};

type CacheKey = (QueryKind, String, ResultRange);

/// Memoizes successful replies for the lifetime of the wrapper.
///
/// Concurrent misses on the same key share one upstream call: later callers
/// wait on the entry's cell. A failed call leaves the cell empty, so the next
/// waiter tries again.
pub struct CachedSearch<S> {
    inner: S,
    entries: DashMap<CacheKey, Arc<OnceCell<Value>>>,
}

impl<S> CachedSearch<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
        }
    }

    /// Number of cached replies.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<S: RegistrySearch> RegistrySearch for CachedSearch<S> {
    async fn search(&self, query: &RegistryQuery, range: ResultRange) -> Result<Value, HttpError> {
        let key = (query.kind, query.term.clone(), range);
        // Clone the cell out so no map shard lock is held across the await.
        let cell = Arc::clone(self.entries.entry(key).or_default().value());
        if let Some(hit) = cell.get() {
            tracing::debug!(source = self.inner.name(), term=%query.term, "registry.cache.hit");
            return Ok(hit.clone());
        }
        cell.get_or_try_init(|| self.inner.search(query, range))
            .await
            .cloned()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Spaces upstream calls at least `min_interval` apart.
pub struct ThrottledSearch<S> {
    inner: S,
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl<S> ThrottledSearch<S> {
    pub fn new(inner: S, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for this caller's turn. Callers queue on the mutex, so slots are
    /// handed out in arrival order.
    async fn acquire(&self) {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        if let Some(at) = *next {
            if at > now {
                tracing::trace!(wait_ms = (at - now).as_millis() as u64, "registry.throttle.wait");
                sleep_until(at).await;
            }
        }
        *next = Some(Instant::now() + self.min_interval);
    }
}

#[async_trait]
impl<S: RegistrySearch> RegistrySearch for ThrottledSearch<S> {
    async fn search(&self, query: &RegistryQuery, range: ResultRange) -> Result<Value, HttpError> {
        self.acquire().await;
        self.inner.search(query, range).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Cache over throttle over `client`; either layer is skipped when disabled
/// (`cache == false`, `min_interval` of zero).
pub fn build_registry_stack<S>(client: S, cache: bool, min_interval: Duration) -> Arc<dyn RegistrySearch>
where
    S: RegistrySearch + 'static,
{
    match (cache, min_interval.is_zero()) {
        (true, false) => Arc::new(CachedSearch::new(ThrottledSearch::new(client, min_interval))),
        (true, true) => Arc::new(CachedSearch::new(client)),
        (false, false) => Arc::new(ThrottledSearch::new(client, min_interval)),
        (false, true) => Arc::new(client),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RegistrySearch for Counting {
        async fn search(&self, query: &RegistryQuery, range: ResultRange) -> Result<Value, HttpError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(HttpError::Network("down".into()));
            }
            Ok(json!({ "term": query.term, "range": range.to_string(), "call": n }))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn cache_hits_skip_upstream() {
        let cached = CachedSearch::new(Counting::default());
        let q = RegistryQuery::applicant("acme");
        let first = cached.search(&q, ResultRange::default()).await.unwrap();
        let second = cached.search(&q, ResultRange::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);

        // Different range or kind is a different entry.
        cached.search(&q, ResultRange::new(26, 50).unwrap()).await.unwrap();
        cached.search(&RegistryQuery::inventor("acme"), ResultRange::default()).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cached.len(), 3);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = CachedSearch::new(Counting {
            fail: true,
            ..Default::default()
        });
        let q = RegistryQuery::applicant("acme");
        assert!(cached.search(&q, ResultRange::default()).await.is_err());
        assert!(cached.search(&q, ResultRange::default()).await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_upstream_call() {
        let cached = CachedSearch::new(Counting {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let q = RegistryQuery::applicant("acme");
        let r = ResultRange::default();
        let (a, b, c) = tokio::join!(cached.search(&q, r), cached.search(&q, r), cached.search(&q, r));
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_failures_retry_for_each_waiter() {
        let cached = CachedSearch::new(Counting {
            fail: true,
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let q = RegistryQuery::inventor("ada");
        let r = ResultRange::default();
        let (a, b) = tokio::join!(cached.search(&q, r), cached.search(&q, r));
        assert!(a.is_err() && b.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_spaces_calls() {
        let throttled = ThrottledSearch::new(Counting::default(), Duration::from_millis(500));
        let q = RegistryQuery::applicant("acme");
        let t0 = Instant::now();
        for _ in 0..3 {
            throttled.search(&q, ResultRange::default()).await.unwrap();
        }
        assert!(t0.elapsed() >= Duration::from_millis(1000));
        assert_eq!(throttled.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stacked_cache_hit_does_not_wait() {
        let stack = build_registry_stack(Counting::default(), true, Duration::from_secs(5));
        let q = RegistryQuery::inventor("lovelace");
        stack.search(&q, ResultRange::default()).await.unwrap();
        let t0 = Instant::now();
        stack.search(&q, ResultRange::default()).await.unwrap();
        assert!(t0.elapsed() < Duration::from_secs(1));
        assert_eq!(stack.name(), "counting");
    }
}
