//! Coalesced cache-aside reader for review pages.
//!
//! A fetch resolves the page key to its canonical cache key, returns the
//! cached bytes on a hit, and on a miss queries the index, fills the cache
//! and returns the freshly serialized page. Identical concurrent fetches
//! share one pass through that sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use review_core::{PageKey, RequestContext, ReviewError, ReviewResult};
use tracing::{debug, trace, warn};

use super::coalescer::{Coalescer, CoalescerStats};
use super::traits::{CacheError, CacheLayer};
use crate::search::{SearchIndex, SearchQuery};
use crate::PageBytes;

/// Default expiry for cached pages.
pub const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(10);

/// Default name of the review search index.
pub const DEFAULT_INDEX: &str = "review";

/// Configuration for the page cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Hard expiry of a cached page.
    pub page_ttl: Duration,
    /// Search index queried on a miss.
    pub index: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_ttl: DEFAULT_PAGE_TTL,
            index: DEFAULT_INDEX.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.page_ttl = ttl;
        self
    }

    /// Set the search index name.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }
}

/// Cache-aside page reader with per-key request coalescing.
///
/// # Type Parameters
///
/// - `C`: the cache backend holding serialized pages
/// - `I`: the search index queried on a miss
///
/// Both may be trait objects, e.g. `ReadCoalescer<dyn CacheLayer, dyn SearchIndex>`.
pub struct ReadCoalescer<C: ?Sized, I: ?Sized> {
    cache: Arc<C>,
    index: Arc<I>,
    config: CacheConfig,
    group: Coalescer<PageKey, ReviewResult<PageBytes>>,
    fill_failures: Arc<AtomicU64>,
}

impl<C, I> ReadCoalescer<C, I>
where
    C: CacheLayer + ?Sized + 'static,
    I: SearchIndex + ?Sized + 'static,
{
    pub fn new(cache: Arc<C>, index: Arc<I>, config: CacheConfig) -> Self {
        Self {
            cache,
            index,
            config,
            group: Coalescer::new(),
            fill_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend(&self) -> &C {
        &self.cache
    }

    /// Fetch the serialized page for `key`.
    ///
    /// The leader's deadline bounds the shared work, so followers observe the
    /// leader's timeout as their result. Each caller's own deadline also
    /// bounds its wait.
    pub async fn fetch(&self, key: &PageKey, ctx: &RequestContext) -> ReviewResult<PageBytes> {
        let key = *key;
        let leader_ctx = *ctx;
        let cache = Arc::clone(&self.cache);
        let index = Arc::clone(&self.index);
        let config = self.config.clone();
        let fill_failures = Arc::clone(&self.fill_failures);

        let shared = self.group.run(key, move || async move {
            leader_ctx
                .within(load_page(cache, index, config, fill_failures, key))
                .await
                .and_then(|page| page)
        });
        ctx.within(shared).await.and_then(|page| page)
    }

    /// Number of pages currently being loaded.
    pub fn in_flight(&self) -> usize {
        self.group.in_flight()
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            fill_failures: self.fill_failures.load(Ordering::Relaxed),
            ..self.group.stats()
        }
    }
}

async fn load_page<C, I>(
    cache: Arc<C>,
    index: Arc<I>,
    config: CacheConfig,
    fill_failures: Arc<AtomicU64>,
    key: PageKey,
) -> ReviewResult<PageBytes>
where
    C: CacheLayer + ?Sized,
    I: SearchIndex + ?Sized,
{
    let cache_key = key.cache_key();
    match cache.get(&cache_key).await {
        Ok(bytes) => {
            trace!(key = %cache_key, "page cache hit");
            return Ok(PageBytes::from(bytes));
        }
        Err(CacheError::Miss) => {
            debug!(key = %cache_key, "page cache miss");
        }
        Err(CacheError::Backend(e)) => return Err(ReviewError::CacheFailure(e)),
    }

    let query = SearchQuery::for_page(config.index.as_str(), &key);
    let hits = index.search(&query).await?;
    let bytes = serde_json::to_vec(&hits).map_err(|e| ReviewError::SearchFailure(e.to_string()))?;

    if let Err(e) = cache.set(&cache_key, &bytes, config.page_ttl).await {
        fill_failures.fetch_add(1, Ordering::Relaxed);
        warn!(key = %cache_key, error = %e, "failed to fill page cache");
    }
    Ok(PageBytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::search::{InMemorySearchIndex, SearchError, SearchHits};
    use async_trait::async_trait;
    use futures_util::future::join_all;
    use review_core::StoreId;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct SlowIndex {
        inner: InMemorySearchIndex,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowIndex {
        fn new(delay: Duration) -> Self {
            let inner = InMemorySearchIndex::new(DEFAULT_INDEX);
            for i in 1..=3u64 {
                inner
                    .index_raw(i.to_string(), json!({ "review_id": i, "store_id": 7 }))
                    .unwrap();
            }
            Self {
                inner,
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchIndex for SlowIndex {
        async fn search(&self, query: &SearchQuery) -> Result<SearchHits, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.inner.search(query).await
        }
    }

    /// Cache whose reads or writes fail with a backend error.
    #[derive(Default)]
    struct BrokenCache {
        fail_get: bool,
        fail_set: bool,
        inner: InMemoryCache,
    }

    #[async_trait]
    impl CacheLayer for BrokenCache {
        async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
            if self.fail_get {
                return Err(CacheError::Backend("connection refused".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
            if self.fail_set {
                return Err(CacheError::Backend("read only".into()));
            }
            self.inner.set(key, value, ttl).await
        }

        fn stats(&self) -> crate::cache::CacheStats {
            self.inner.stats()
        }
    }

    fn page(store: u64) -> PageKey {
        PageKey::from_page(StoreId::new(store), 1, 10)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_share_one_query() {
        let index = Arc::new(SlowIndex::new(Duration::from_millis(100)));
        let reader = ReadCoalescer::new(
            Arc::new(InMemoryCache::new()),
            Arc::clone(&index),
            CacheConfig::default(),
        );
        let ctx = RequestContext::background();
        let key = page(7);

        let results = join_all((0..10).map(|_| reader.fetch(&key, &ctx))).await;

        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
        let first = results[0].as_ref().unwrap();
        assert!(results.iter().all(|r| r.as_ref().unwrap() == first));
        assert_eq!(reader.stats().coalesced, 9);
        assert_eq!(reader.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_skips_index_until_ttl_expires() {
        let index = Arc::new(SlowIndex::new(Duration::from_millis(1)));
        let reader = ReadCoalescer::new(
            Arc::new(InMemoryCache::new()),
            Arc::clone(&index),
            CacheConfig::default(),
        );
        let ctx = RequestContext::background();

        reader.fetch(&page(7), &ctx).await.unwrap();
        reader.fetch(&page(7), &ctx).await.unwrap();
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
        assert_eq!(reader.backend().stats().hits, 1);

        tokio::time::advance(DEFAULT_PAGE_TTL).await;
        reader.fetch(&page(7), &ctx).await.unwrap();
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_outage_never_falls_through() {
        let index = Arc::new(SlowIndex::new(Duration::from_millis(1)));
        let cache = Arc::new(BrokenCache {
            fail_get: true,
            ..Default::default()
        });
        let reader = ReadCoalescer::new(cache, Arc::clone(&index), CacheConfig::default());

        let err = reader
            .fetch(&page(7), &RequestContext::background())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::CacheFailure(_)));
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fill_still_returns_page() {
        let index = Arc::new(SlowIndex::new(Duration::from_millis(1)));
        let cache = Arc::new(BrokenCache {
            fail_set: true,
            ..Default::default()
        });
        let reader = ReadCoalescer::new(cache, Arc::clone(&index), CacheConfig::default());

        let bytes = reader
            .fetch(&page(7), &RequestContext::background())
            .await
            .unwrap();
        let hits: SearchHits = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(hits.total, 3);
        assert_eq!(reader.stats().fill_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_failure_is_reported() {
        let index = Arc::new(SlowIndex::new(Duration::from_millis(1)));
        index.inner.set_unavailable(true);
        let reader = ReadCoalescer::new(
            Arc::new(InMemoryCache::new()),
            Arc::clone(&index),
            CacheConfig::default(),
        );

        let err = reader
            .fetch(&page(7), &RequestContext::background())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::SearchFailure(_)));
        assert_eq!(reader.backend().stats().sets, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leader_deadline_applies_to_followers() {
        let index = Arc::new(SlowIndex::new(Duration::from_secs(5)));
        let reader = ReadCoalescer::new(
            Arc::new(InMemoryCache::new()),
            Arc::clone(&index),
            CacheConfig::default(),
        );
        let leader = RequestContext::with_timeout(Duration::from_millis(100));
        let patient = RequestContext::background();
        let key = page(7);

        let (a, b) = tokio::join!(reader.fetch(&key, &leader), reader.fetch(&key, &patient));
        assert_eq!(a, Err(ReviewError::DeadlineExceeded));
        assert_eq!(b, Err(ReviewError::DeadlineExceeded));
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_leader_leaves_nothing_to_join() {
        let index = Arc::new(SlowIndex::new(Duration::from_secs(2)));
        let reader = ReadCoalescer::new(
            Arc::new(InMemoryCache::new()),
            Arc::clone(&index),
            CacheConfig::default(),
        );
        let key = page(7);
        let leader = RequestContext::with_timeout(Duration::from_secs(1));

        let gone = tokio::time::timeout(Duration::from_millis(10), reader.fetch(&key, &leader)).await;
        assert!(gone.is_err());
        assert_eq!(reader.in_flight(), 0);

        tokio::time::sleep(Duration::from_millis(1490)).await;
        let bytes = reader
            .fetch(&key, &RequestContext::background())
            .await
            .unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(index.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reader.stats().abandoned, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_pages_are_independent() {
        let index = Arc::new(SlowIndex::new(Duration::from_millis(50)));
        let reader = ReadCoalescer::new(
            Arc::new(InMemoryCache::new()),
            Arc::clone(&index),
            CacheConfig::default().with_ttl(Duration::from_secs(30)),
        );
        let ctx = RequestContext::background();
        let keys = [page(7), page(8), PageKey::from_page(StoreId::new(7), 2, 10)];

        let results = join_all(keys.iter().map(|k| reader.fetch(k, &ctx))).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(index.calls.load(Ordering::SeqCst), 3);
        assert_eq!(reader.stats().executions, 3);
    }
}
