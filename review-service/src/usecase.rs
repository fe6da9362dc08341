//! Review use cases.
//!
//! Validation and authorization run before any mutation. Multi-row writes
//! go through a single [`WriteBatch`] so they land together or not at all.
//! Every collaborator call is bounded by the caller's [`RequestContext`].

use std::sync::Arc;

use chrono::Utc;
use review_core::{
    Appeal, AppealId, AppealParam, AppealStatus, AuditAppealParam, IdSource, NewReview, PageKey,
    RecordKind, Reply, ReplyId, ReplyParam, RequestContext, Review, ReviewError, ReviewId,
    ReviewResult, ReviewStatus, StoreId,
};
use review_storage::{decode_page, DurableStore, PageSource, ReviewPage, StoreError, WriteBatch};
use tracing::{debug, warn};

use crate::validation::{
    validate_appeal, validate_audit, validate_new_review, validate_reply, ValidateRange,
};

/// Entry point for every review operation.
#[derive(Clone)]
pub struct ReviewUsecase {
    store: Arc<dyn DurableStore>,
    pages: Arc<dyn PageSource>,
    ids: Arc<dyn IdSource>,
}

impl ReviewUsecase {
    pub fn new(
        store: Arc<dyn DurableStore>,
        pages: Arc<dyn PageSource>,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self { store, pages, ids }
    }

    async fn load_review(&self, ctx: &RequestContext, review_id: ReviewId) -> ReviewResult<Review> {
        ctx.within(self.store.review_get(review_id))
            .await??
            .ok_or_else(|| ReviewError::not_found(RecordKind::Review, review_id))
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Create the review for an order. One review per order.
    pub async fn create_review(&self, ctx: &RequestContext, new: NewReview) -> ReviewResult<Review> {
        validate_new_review(&new)?;
        let order_id = new.order_id;
        debug!(order_id = %order_id, store_id = %new.store_id, "Creating review");

        let existing = ctx.within(self.store.review_list_by_order(order_id)).await??;
        if !existing.is_empty() {
            return Err(ReviewError::AlreadyReviewed { order_id });
        }

        let review = Review::from_new(ReviewId::new(self.ids.next_id()), new, Utc::now());
        match ctx.within(self.store.review_insert(&review)).await? {
            Ok(()) => {
                debug!(review_id = %review.review_id, order_id = %order_id, "Review created");
                Ok(review)
            }
            // Lost a race with a concurrent create for the same order.
            Err(StoreError::UniqueViolation {
                constraint: "review.order_id",
            }) => Err(ReviewError::AlreadyReviewed { order_id }),
            Err(e) => Err(e.into()),
        }
    }

    /// Reply to a review on behalf of the store that owns it.
    ///
    /// The reply row and the review's `has_reply` flag are written in one
    /// batch.
    pub async fn create_reply(&self, ctx: &RequestContext, param: ReplyParam) -> ReviewResult<Reply> {
        validate_reply(&param)?;
        let review_id = param.review_id;
        debug!(review_id = %review_id, store_id = %param.store_id, "Creating reply");

        let review = self.load_review(ctx, review_id).await?;
        if review.has_reply {
            return Err(ReviewError::AlreadyReplied { review_id });
        }
        if review.store_id != param.store_id {
            return Err(ReviewError::Unauthorized {
                review_id,
                store_id: param.store_id,
            });
        }

        let reply = Reply::new(ReplyId::new(self.ids.next_id()), param, Utc::now());
        let mut batch = WriteBatch::new();
        batch
            .insert_reply(reply.clone())
            .mark_review_replied(review_id);

        match ctx.within(self.store.commit(batch)).await? {
            Ok(()) => {
                debug!(review_id = %review_id, reply_id = %reply.reply_id, "Reply created");
                Ok(reply)
            }
            Err(StoreError::UniqueViolation {
                constraint: "reply.review_id",
            })
            | Err(StoreError::ConditionFailed { .. }) => {
                Err(ReviewError::AlreadyReplied { review_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// File or re-file a store's appeal against one of its reviews.
    ///
    /// Re-filing a pending appeal overwrites it in place and keeps its id.
    pub async fn appeal_review(
        &self,
        ctx: &RequestContext,
        param: AppealParam,
    ) -> ReviewResult<Appeal> {
        validate_appeal(&param)?;
        let review_id = param.review_id;
        let store_id = param.store_id;
        debug!(review_id = %review_id, store_id = %store_id, "Filing appeal");

        let review = self.load_review(ctx, review_id).await?;
        if review.store_id != store_id {
            return Err(ReviewError::Unauthorized {
                review_id,
                store_id,
            });
        }

        let existing = ctx
            .within(self.store.appeal_find(review_id, store_id))
            .await??;
        let appeal_id = match existing {
            Some(appeal) if appeal.status.is_audited() => {
                return Err(ReviewError::AppealAlreadyAudited { review_id });
            }
            Some(appeal) => appeal.appeal_id,
            None => AppealId::new(self.ids.next_id()),
        };

        let appeal = Appeal::pending(appeal_id, param, Utc::now());
        match ctx.within(self.store.appeal_upsert(&appeal)).await? {
            Ok(stored) => {
                debug!(review_id = %review_id, appeal_id = %stored.appeal_id, "Appeal stored");
                Ok(stored)
            }
            // Audited between the look-up and the upsert.
            Err(StoreError::ConditionFailed { .. }) => {
                Err(ReviewError::AppealAlreadyAudited { review_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rule on a pending appeal. Approval hides the review in the same batch.
    ///
    /// An appeal is audited at most once; a second ruling fails with
    /// `AppealAlreadyAudited` and leaves both rows untouched.
    pub async fn audit_appeal(
        &self,
        ctx: &RequestContext,
        param: AuditAppealParam,
    ) -> ReviewResult<()> {
        validate_audit(&param)?;
        let AuditAppealParam {
            appeal_id,
            review_id,
            status,
            op_user,
        } = param;
        debug!(
            appeal_id = %appeal_id,
            review_id = %review_id,
            status = ?status,
            op_user = %op_user,
            "Auditing appeal"
        );

        let appeal = ctx
            .within(self.store.appeal_get(appeal_id))
            .await??
            .ok_or_else(|| ReviewError::not_found(RecordKind::Appeal, appeal_id))?;
        if appeal.review_id != review_id {
            return Err(ReviewError::validation(
                "review_id",
                format!("appeal {appeal_id} belongs to review {}", appeal.review_id),
            ));
        }
        if appeal.status.is_audited() {
            return Err(ReviewError::AppealAlreadyAudited { review_id });
        }

        let mut batch = WriteBatch::new();
        batch.set_appeal_status(appeal_id, status, op_user);
        if status == AppealStatus::Approved {
            batch.set_review_status(review_id, ReviewStatus::Hidden);
        }

        match ctx.within(self.store.commit(batch)).await? {
            Ok(()) => Ok(()),
            // Audited by a concurrent ruling after the look-up.
            Err(StoreError::ConditionFailed { .. }) => {
                Err(ReviewError::AppealAlreadyAudited { review_id })
            }
            Err(e) => {
                warn!(appeal_id = %appeal_id, review_id = %review_id, error = %e, "Audit commit failed");
                Err(e.into())
            }
        }
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// One page of a store's reviews, newest index order.
    ///
    /// `page` below 1 reads the first page; `size` outside `1..=50` reads 10.
    pub async fn list_review_by_store_id(
        &self,
        ctx: &RequestContext,
        store_id: StoreId,
        page: i64,
        size: i64,
    ) -> ReviewResult<ReviewPage> {
        store_id.as_u64().validate_positive("store_id")?;
        let key = PageKey::from_page(store_id, page, size);
        debug!(store_id = %store_id, key = %key, "Listing reviews");

        let bytes = self.pages.fetch_page(&key, ctx).await?;
        let decoded = decode_page(&bytes)?;
        if !decoded.skipped.is_empty() {
            debug!(key = %key, skipped = decoded.skipped.len(), "Page had undecodable records");
        }
        Ok(decoded)
    }
}
