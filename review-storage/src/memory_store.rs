//! In-memory durable store.
//!
//! Enforces the same constraints a relational backend would: unique
//! `order_id`, one reply per review, one appeal per review, and atomic
//! batch commits. Commits are staged on a copy of the tables and swapped
//! in only when every operation succeeds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use review_core::{
    Appeal, AppealId, OrderId, RecordKind, Reply, Review, ReviewId, StoreId,
};

use crate::durable::{DurableStore, WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};

const NO_FAULT: usize = usize::MAX;

#[derive(Debug, Default, Clone)]
struct Tables {
    reviews: HashMap<ReviewId, Review>,
    review_by_order: HashMap<OrderId, ReviewId>,
    /// Keyed by the parent review.
    replies: HashMap<ReviewId, Reply>,
    appeals: HashMap<AppealId, Appeal>,
    appeal_by_review: HashMap<ReviewId, AppealId>,
}

impl Tables {
    fn apply(&mut self, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::InsertReply(reply) => {
                if self.replies.contains_key(&reply.review_id) {
                    return Err(StoreError::UniqueViolation {
                        constraint: "reply.review_id",
                    });
                }
                if self.replies.values().any(|r| r.reply_id == reply.reply_id) {
                    return Err(StoreError::UniqueViolation {
                        constraint: "reply.reply_id",
                    });
                }
                self.replies.insert(reply.review_id, reply);
            }
            WriteOp::MarkReviewReplied { review_id } => {
                let review = self.review_mut(review_id)?;
                if review.has_reply {
                    return Err(StoreError::ConditionFailed {
                        reason: format!("review {review_id} already has a reply"),
                    });
                }
                review.has_reply = true;
                review.updated_at = Utc::now();
            }
            WriteOp::SetReviewStatus { review_id, status } => {
                let review = self.review_mut(review_id)?;
                review.status = status;
                review.updated_at = Utc::now();
            }
            WriteOp::SetAppealStatus {
                appeal_id,
                status,
                op_user,
            } => {
                let appeal = self.appeals.get_mut(&appeal_id).ok_or(StoreError::NotFound {
                    kind: RecordKind::Appeal,
                    id: appeal_id.as_u64(),
                })?;
                if appeal.status.is_audited() {
                    return Err(StoreError::ConditionFailed {
                        reason: format!("appeal {appeal_id} is already audited"),
                    });
                }
                appeal.status = status;
                appeal.op_user = op_user;
                appeal.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    fn review_mut(&mut self, review_id: ReviewId) -> StoreResult<&mut Review> {
        self.reviews.get_mut(&review_id).ok_or(StoreError::NotFound {
            kind: RecordKind::Review,
            id: review_id.as_u64(),
        })
    }
}

/// In-memory [`DurableStore`] with fault injection for tests.
#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    /// Number of ops the next commit applies before failing.
    fail_commit_after: AtomicUsize,
    commits: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            unavailable: AtomicBool::new(false),
            fail_commit_after: AtomicUsize::new(NO_FAULT),
            commits: AtomicU64::new(0),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a backend error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next commit fail after applying `ops` of its operations.
    ///
    /// The partial work is discarded, so the store is left exactly as it was
    /// before the commit. One-shot.
    pub fn fail_commit_after(&self, ops: usize) {
        self.fail_commit_after.store(ops, Ordering::SeqCst);
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn review_count(&self) -> usize {
        self.read(|t| t.reviews.len()).unwrap_or(0)
    }

    pub fn reply_count(&self) -> usize {
        self.read(|t| t.replies.len()).unwrap_or(0)
    }

    pub fn appeal_count(&self) -> usize {
        self.read(|t| t.appeals.len()).unwrap_or(0)
    }

    /// Drop every record.
    pub fn clear(&self) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        *tables = Tables::default();
        Ok(())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> StoreResult<T> {
        self.check_available()?;
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&tables))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        self.check_available()?;
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut tables)
    }

    fn upsert_appeal(tables: &mut Tables, appeal: &Appeal) -> StoreResult<Appeal> {
        if let Some(existing_id) = tables.appeal_by_review.get(&appeal.review_id).copied() {
            let existing = tables
                .appeals
                .get_mut(&existing_id)
                .ok_or_else(|| {
                    StoreError::Backend(format!(
                        "appeal index points at missing appeal {existing_id}"
                    ))
                })?;
            if existing.status.is_audited() {
                return Err(StoreError::ConditionFailed {
                    reason: format!("appeal {existing_id} is no longer pending"),
                });
            }
            existing.reason = appeal.reason.clone();
            existing.content = appeal.content.clone();
            existing.pic_info = appeal.pic_info.clone();
            existing.video_info = appeal.video_info.clone();
            existing.status = appeal.status;
            existing.updated_at = appeal.updated_at;
            return Ok(existing.clone());
        }

        if tables.appeals.contains_key(&appeal.appeal_id) {
            return Err(StoreError::UniqueViolation {
                constraint: "appeal.appeal_id",
            });
        }
        tables
            .appeal_by_review
            .insert(appeal.review_id, appeal.appeal_id);
        tables.appeals.insert(appeal.appeal_id, appeal.clone());
        Ok(appeal.clone())
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn review_insert(&self, review: &Review) -> StoreResult<()> {
        self.write(|tables| {
            if tables.reviews.contains_key(&review.review_id) {
                return Err(StoreError::UniqueViolation {
                    constraint: "review.review_id",
                });
            }
            if tables.review_by_order.contains_key(&review.order_id) {
                return Err(StoreError::UniqueViolation {
                    constraint: "review.order_id",
                });
            }
            tables
                .review_by_order
                .insert(review.order_id, review.review_id);
            tables.reviews.insert(review.review_id, review.clone());
            Ok(())
        })
    }

    async fn review_get(&self, review_id: ReviewId) -> StoreResult<Option<Review>> {
        self.read(|t| t.reviews.get(&review_id).cloned())
    }

    async fn review_list_by_order(&self, order_id: OrderId) -> StoreResult<Vec<Review>> {
        self.read(|t| {
            t.review_by_order
                .get(&order_id)
                .and_then(|id| t.reviews.get(id))
                .cloned()
                .into_iter()
                .collect()
        })
    }

    async fn reply_get_by_review(&self, review_id: ReviewId) -> StoreResult<Option<Reply>> {
        self.read(|t| t.replies.get(&review_id).cloned())
    }

    async fn appeal_get(&self, appeal_id: AppealId) -> StoreResult<Option<Appeal>> {
        self.read(|t| t.appeals.get(&appeal_id).cloned())
    }

    async fn appeal_find(
        &self,
        review_id: ReviewId,
        store_id: StoreId,
    ) -> StoreResult<Option<Appeal>> {
        self.read(|t| {
            t.appeal_by_review
                .get(&review_id)
                .and_then(|id| t.appeals.get(id))
                .filter(|a| a.store_id == store_id)
                .cloned()
        })
    }

    async fn appeal_upsert(&self, appeal: &Appeal) -> StoreResult<Appeal> {
        self.write(|tables| Self::upsert_appeal(tables, appeal))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.write(|tables| {
            // Armed faults survive commits refused before reaching the tables.
            let fail_after = self.fail_commit_after.swap(NO_FAULT, Ordering::SeqCst);
            let mut staged = tables.clone();
            for (applied, op) in batch.into_ops().into_iter().enumerate() {
                if applied == fail_after {
                    return Err(StoreError::Backend(format!(
                        "injected failure after {applied} operations"
                    )));
                }
                staged.apply(op)?;
            }
            *tables = staged;
            Ok(())
        })?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
