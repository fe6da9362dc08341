//! Review Catalog Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Instrumented collaborators (counting index, flaky cache, recording page source)
//! - Deterministic identifier source
//! - Proptest generators for parameters and records
//! - Fixtures and assertions for common scenarios

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

// Re-export the in-memory collaborators from their source crate
pub use review_storage::{InMemoryCache, InMemorySearchIndex, InMemoryStore};

pub use review_core::{
    Appeal, AppealId, AppealParam, AppealStatus, AuditAppealParam, IdSource, NewReview, OrderId,
    PageKey, RecordKind, Reply, ReplyId, ReplyParam, RequestContext, Review, ReviewError,
    ReviewId, ReviewResult, ReviewStatus, StoreId, UserId,
};
use review_storage::{
    CacheError, CacheLayer, CacheStats, PageBytes, PageSource, SearchError, SearchHits,
    SearchIndex, SearchQuery,
};

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Hands out `start, start + 1, ...`.
#[derive(Debug)]
pub struct SequentialIdSource {
    next: AtomicU64,
}

impl SequentialIdSource {
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// The value the next call will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for SequentialIdSource {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdSource for SequentialIdSource {
    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

// ============================================================================
// INSTRUMENTED COLLABORATORS
// ============================================================================

/// Search index wrapper that counts queries and can delay each one.
///
/// The delay runs on the tokio clock, so with paused time concurrent callers
/// pile up behind the first query deterministically.
#[derive(Debug)]
pub struct CountingSearchIndex {
    inner: InMemorySearchIndex,
    delay: Duration,
    calls: AtomicU64,
}

impl CountingSearchIndex {
    pub fn new(inner: InMemorySearchIndex) -> Self {
        Self::with_delay(inner, Duration::ZERO)
    }

    pub fn with_delay(inner: InMemorySearchIndex, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemorySearchIndex {
        &self.inner
    }
}

#[async_trait]
impl SearchIndex for CountingSearchIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.search(query).await
    }
}

/// Cache wrapper whose reads and writes can be switched to backend failures.
#[derive(Debug, Default)]
pub struct FlakyCache {
    inner: InMemoryCache,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryCache {
        &self.inner
    }
}

#[async_trait]
impl CacheLayer for FlakyCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("cache read refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("cache write refused".to_string()));
        }
        self.inner.set(key, value, ttl).await
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

/// Page source that records every requested key and answers with a fixed
/// payload.
#[derive(Debug)]
pub struct RecordingPageSource {
    payload: PageBytes,
    requests: Mutex<Vec<PageKey>>,
}

impl RecordingPageSource {
    pub fn new(payload: impl Into<PageBytes>) -> Self {
        Self {
            payload: payload.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A source answering with an empty hits envelope.
    pub fn empty() -> Self {
        Self::new(br#"{"total":0,"hits":[]}"#.to_vec())
    }

    pub fn requests(&self) -> Vec<PageKey> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageSource for RecordingPageSource {
    async fn fetch_page(&self, key: &PageKey, _ctx: &RequestContext) -> ReviewResult<PageBytes> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(*key);
        }
        Ok(Arc::clone(&self.payload))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for review parameters and records.

    use super::*;
    use proptest::prelude::*;

    /// A non-zero identifier.
    pub fn arb_raw_id() -> impl Strategy<Value = u64> {
        1u64..=u64::MAX
    }

    pub fn arb_score() -> impl Strategy<Value = i32> {
        1i32..=5
    }

    /// Content that passes validation: non-empty, at most 1000 chars.
    pub fn arb_content() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9 ,.!]{0,199}"
    }

    /// Raw `(page, size)` arguments, including out-of-range values.
    pub fn arb_page_args() -> impl Strategy<Value = (i64, i64)> {
        (-5i64..1_000, -10i64..100)
    }

    pub fn arb_review_status() -> impl Strategy<Value = ReviewStatus> {
        prop_oneof![
            Just(ReviewStatus::Visible),
            Just(ReviewStatus::PendingAudit),
            Just(ReviewStatus::Approved),
            Just(ReviewStatus::Rejected),
            Just(ReviewStatus::Hidden),
        ]
    }

    /// A valid review creation request.
    pub fn arb_new_review() -> impl Strategy<Value = NewReview> {
        (
            arb_raw_id(),
            arb_raw_id(),
            arb_raw_id(),
            arb_score(),
            arb_score(),
            arb_score(),
            arb_content(),
            any::<bool>(),
        )
            .prop_map(
                |(order, user, store, score, service, express, content, anonymous)| NewReview {
                    order_id: OrderId::new(order),
                    user_id: UserId::new(user),
                    store_id: StoreId::new(store),
                    score,
                    service_score: service,
                    express_score: express,
                    content,
                    pic_info: String::new(),
                    video_info: String::new(),
                    anonymous,
                },
            )
    }

    /// A review record as it would sit in the index.
    pub fn arb_review() -> impl Strategy<Value = Review> {
        (arb_raw_id(), arb_new_review(), arb_review_status(), any::<bool>()).prop_map(
            |(id, new, status, has_reply)| {
                let mut review = Review::from_new(ReviewId::new(id), new, fixtures::epoch());
                review.status = status;
                review.has_reply = has_reply;
                review
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made parameters and seeded collaborators.

    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    /// Fixed timestamp with whole seconds, so records survive the
    /// second-precision wire format unchanged.
    pub fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(1_717_200_000, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn new_review(order_id: u64, store_id: u64) -> NewReview {
        NewReview {
            order_id: OrderId::new(order_id),
            user_id: UserId::new(501),
            store_id: StoreId::new(store_id),
            score: 5,
            service_score: 4,
            express_score: 5,
            content: "Arrived quickly and well packed".to_string(),
            pic_info: String::new(),
            video_info: String::new(),
            anonymous: false,
        }
    }

    pub fn review(review_id: u64, order_id: u64, store_id: u64) -> Review {
        Review::from_new(
            ReviewId::new(review_id),
            new_review(order_id, store_id),
            epoch(),
        )
    }

    pub fn reply_param(review_id: ReviewId, store_id: u64) -> ReplyParam {
        ReplyParam {
            review_id,
            store_id: StoreId::new(store_id),
            content: "Thank you for shopping with us".to_string(),
            pic_info: String::new(),
            video_info: String::new(),
        }
    }

    pub fn appeal_param(review_id: ReviewId, store_id: u64, reason: &str) -> AppealParam {
        AppealParam {
            review_id,
            store_id: StoreId::new(store_id),
            reason: reason.to_string(),
            content: "The customer never received this order".to_string(),
            pic_info: String::new(),
            video_info: String::new(),
        }
    }

    pub fn audit_param(
        appeal_id: AppealId,
        review_id: ReviewId,
        status: AppealStatus,
    ) -> AuditAppealParam {
        AuditAppealParam {
            appeal_id,
            review_id,
            status,
            op_user: "moderator-7".to_string(),
        }
    }

    /// An index named `review` holding `count` reviews for `store_id`,
    /// with review ids starting at `first_id`.
    pub fn seeded_index(store_id: u64, first_id: u64, count: u64) -> InMemorySearchIndex {
        let index = InMemorySearchIndex::new("review");
        for review_id in first_id..first_id + count {
            // Seeding an in-memory index only fails on a poisoned lock.
            let _ = index.index_review(&review(review_id, review_id + 10_000, store_id));
        }
        index
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over the review error taxonomy.

    use super::*;

    pub fn assert_ok<T: std::fmt::Debug>(result: &ReviewResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got {:?}", result);
    }

    pub fn assert_not_found<T: std::fmt::Debug>(result: &ReviewResult<T>, kind: RecordKind) {
        match result {
            Err(ReviewError::NotFound { kind: got, .. }) => assert_eq!(*got, kind),
            other => panic!("Expected NotFound({kind}), got {:?}", other),
        }
    }

    pub fn assert_validation_error<T: std::fmt::Debug>(result: &ReviewResult<T>, field: &str) {
        match result {
            Err(ReviewError::Validation { field: got, .. }) => assert_eq!(got, field),
            other => panic!("Expected Validation({field}), got {:?}", other),
        }
    }

    pub fn assert_infrastructure_error<T: std::fmt::Debug>(result: &ReviewResult<T>) {
        match result {
            Err(e) if e.is_infrastructure() => {}
            other => panic!("Expected infrastructure error, got {:?}", other),
        }
    }
}
