//! The authoritative record store and its atomic write batches.

use async_trait::async_trait;
use review_core::{
    Appeal, AppealId, AppealStatus, OrderId, Reply, Review, ReviewId, ReviewStatus, StoreId,
};

use crate::error::StoreResult;

/// Durable storage for reviews, replies and appeals.
///
/// Point lookups return `Ok(None)` when the row is absent so that callers
/// can tell "not found" apart from a backend failure.
#[async_trait]
pub trait DurableStore: Send + Sync {
    // ========================================================================
    // REVIEW OPERATIONS
    // ========================================================================

    /// Insert a review. Both `review_id` and `order_id` are unique; a clash
    /// on either is a `UniqueViolation`.
    async fn review_insert(&self, review: &Review) -> StoreResult<()>;

    async fn review_get(&self, review_id: ReviewId) -> StoreResult<Option<Review>>;

    /// Reviews written for an order. At most one in a consistent store.
    async fn review_list_by_order(&self, order_id: OrderId) -> StoreResult<Vec<Review>>;

    // ========================================================================
    // REPLY OPERATIONS
    // ========================================================================

    async fn reply_get_by_review(&self, review_id: ReviewId) -> StoreResult<Option<Reply>>;

    // ========================================================================
    // APPEAL OPERATIONS
    // ========================================================================

    async fn appeal_get(&self, appeal_id: AppealId) -> StoreResult<Option<Appeal>>;

    /// The appeal filed by `store_id` against `review_id`, if any.
    async fn appeal_find(
        &self,
        review_id: ReviewId,
        store_id: StoreId,
    ) -> StoreResult<Option<Appeal>>;

    /// Insert an appeal, or overwrite the existing one for the same review.
    ///
    /// The overwrite replaces reason, content, media and status and keeps the
    /// stored `appeal_id` and `created_at`. It only applies while the stored
    /// appeal is still pending; otherwise `ConditionFailed` is returned and
    /// nothing changes. Returns the row as stored.
    async fn appeal_upsert(&self, appeal: &Appeal) -> StoreResult<Appeal>;

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    /// Apply every operation in `batch` atomically: all of them or none.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// A buffered mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert a reply. Unique per review.
    InsertReply(Reply),
    /// Flip the review's `has_reply` flag. Fails with `ConditionFailed` if it
    /// is already set.
    MarkReviewReplied { review_id: ReviewId },
    SetReviewStatus {
        review_id: ReviewId,
        status: ReviewStatus,
    },
    /// Rule on a pending appeal. Fails with `ConditionFailed` if the appeal
    /// is already approved or rejected.
    SetAppealStatus {
        appeal_id: AppealId,
        status: AppealStatus,
        op_user: String,
    },
}

/// Collects mutations that must commit together.
///
/// Nothing is applied until the batch is handed to
/// [`DurableStore::commit`]. Dropping an uncommitted batch has no effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_reply(&mut self, reply: Reply) -> &mut Self {
        self.ops.push(WriteOp::InsertReply(reply));
        self
    }

    pub fn mark_review_replied(&mut self, review_id: ReviewId) -> &mut Self {
        self.ops.push(WriteOp::MarkReviewReplied { review_id });
        self
    }

    pub fn set_review_status(&mut self, review_id: ReviewId, status: ReviewStatus) -> &mut Self {
        self.ops.push(WriteOp::SetReviewStatus { review_id, status });
        self
    }

    pub fn set_appeal_status(
        &mut self,
        appeal_id: AppealId,
        status: AppealStatus,
        op_user: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(WriteOp::SetAppealStatus {
            appeal_id,
            status,
            op_user: op_user.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}
