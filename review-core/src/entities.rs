//! Review, reply and appeal records plus the parameters that create them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReviewError;
use crate::identity::{AppealId, OrderId, ReplyId, ReviewId, StoreId, UserId};
use crate::time_format;

// ============================================================================
// ENUMS
// ============================================================================

/// Record type discriminator used in errors and storage diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Review,
    Reply,
    Appeal,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Review => write!(f, "review"),
            RecordKind::Reply => write!(f, "reply"),
            RecordKind::Appeal => write!(f, "appeal"),
        }
    }
}

/// Lifecycle of a review. Encoded on the wire as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ReviewStatus {
    /// Shown to shoppers.
    #[default]
    Visible,
    /// Waiting for moderation.
    PendingAudit,
    /// Passed moderation.
    Approved,
    /// Failed moderation.
    Rejected,
    /// Hidden after an approved merchant appeal.
    Hidden,
}

impl ReviewStatus {
    /// Integer code stored alongside the record.
    pub fn code(self) -> i32 {
        match self {
            ReviewStatus::Visible => 0,
            ReviewStatus::PendingAudit => 10,
            ReviewStatus::Approved => 20,
            ReviewStatus::Rejected => 30,
            ReviewStatus::Hidden => 40,
        }
    }
}

impl From<ReviewStatus> for i32 {
    fn from(status: ReviewStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for ReviewStatus {
    type Error = ReviewError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ReviewStatus::Visible),
            10 => Ok(ReviewStatus::PendingAudit),
            20 => Ok(ReviewStatus::Approved),
            30 => Ok(ReviewStatus::Rejected),
            40 => Ok(ReviewStatus::Hidden),
            other => Err(ReviewError::validation(
                "status",
                format!("unknown review status code {other}"),
            )),
        }
    }
}

/// Lifecycle of a merchant appeal: `Pending` until audited, then terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum AppealStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl AppealStatus {
    /// Integer code stored alongside the record.
    pub fn code(self) -> i32 {
        match self {
            AppealStatus::Pending => 10,
            AppealStatus::Approved => 20,
            AppealStatus::Rejected => 30,
        }
    }

    /// Whether an operator has already ruled on the appeal.
    pub fn is_audited(self) -> bool {
        self.code() > AppealStatus::Pending.code()
    }
}

impl From<AppealStatus> for i32 {
    fn from(status: AppealStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for AppealStatus {
    type Error = ReviewError;

    /// `10` is pending, `20` approved; any other code above pending is a
    /// rejection.
    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            10 => Ok(AppealStatus::Pending),
            20 => Ok(AppealStatus::Approved),
            c if c > 10 => Ok(AppealStatus::Rejected),
            other => Err(ReviewError::validation(
                "status",
                format!("unknown appeal status code {other}"),
            )),
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// A customer review of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: ReviewId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub store_id: StoreId,
    /// Overall score, 1 to 5.
    pub score: i32,
    pub service_score: i32,
    pub express_score: i32,
    pub content: String,
    /// Serialized picture references.
    #[serde(default)]
    pub pic_info: String,
    /// Serialized video references.
    #[serde(default)]
    pub video_info: String,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub status: ReviewStatus,
    /// Set once, when the store replies.
    #[serde(default)]
    pub has_reply: bool,
    #[serde(with = "time_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "time_format")]
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Build a fresh, visible, unreplied review from creation parameters.
    pub fn from_new(review_id: ReviewId, new: NewReview, now: DateTime<Utc>) -> Self {
        Self {
            review_id,
            order_id: new.order_id,
            user_id: new.user_id,
            store_id: new.store_id,
            score: new.score,
            service_score: new.service_score,
            express_score: new.express_score,
            content: new.content,
            pic_info: new.pic_info,
            video_info: new.video_info,
            anonymous: new.anonymous,
            status: ReviewStatus::Visible,
            has_reply: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A store's reply to one of its reviews. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub reply_id: ReplyId,
    pub review_id: ReviewId,
    pub store_id: StoreId,
    pub content: String,
    #[serde(default)]
    pub pic_info: String,
    #[serde(default)]
    pub video_info: String,
    #[serde(with = "time_format")]
    pub created_at: DateTime<Utc>,
}

impl Reply {
    pub fn new(reply_id: ReplyId, param: ReplyParam, now: DateTime<Utc>) -> Self {
        Self {
            reply_id,
            review_id: param.review_id,
            store_id: param.store_id,
            content: param.content,
            pic_info: param.pic_info,
            video_info: param.video_info,
            created_at: now,
        }
    }
}

/// A store's request to have one of its reviews hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub appeal_id: AppealId,
    pub review_id: ReviewId,
    pub store_id: StoreId,
    pub status: AppealStatus,
    pub reason: String,
    pub content: String,
    #[serde(default)]
    pub pic_info: String,
    #[serde(default)]
    pub video_info: String,
    /// Operator who audited the appeal; empty while pending.
    #[serde(default)]
    pub op_user: String,
    #[serde(with = "time_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "time_format")]
    pub updated_at: DateTime<Utc>,
}

impl Appeal {
    /// Build a pending appeal from filing parameters.
    pub fn pending(appeal_id: AppealId, param: AppealParam, now: DateTime<Utc>) -> Self {
        Self {
            appeal_id,
            review_id: param.review_id,
            store_id: param.store_id,
            status: AppealStatus::Pending,
            reason: param.reason,
            content: param.content,
            pic_info: param.pic_info,
            video_info: param.video_info,
            op_user: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Parameters for creating a review.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewReview {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub store_id: StoreId,
    pub score: i32,
    pub service_score: i32,
    pub express_score: i32,
    pub content: String,
    #[serde(default)]
    pub pic_info: String,
    #[serde(default)]
    pub video_info: String,
    #[serde(default)]
    pub anonymous: bool,
}

/// Parameters for a store replying to a review.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplyParam {
    pub review_id: ReviewId,
    pub store_id: StoreId,
    pub content: String,
    #[serde(default)]
    pub pic_info: String,
    #[serde(default)]
    pub video_info: String,
}

/// Parameters for a store appealing a review.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppealParam {
    pub review_id: ReviewId,
    pub store_id: StoreId,
    pub reason: String,
    pub content: String,
    #[serde(default)]
    pub pic_info: String,
    #[serde(default)]
    pub video_info: String,
}

/// Parameters for an operator ruling on an appeal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditAppealParam {
    pub appeal_id: AppealId,
    pub review_id: ReviewId,
    /// Outcome of the audit; must not be `Pending`.
    pub status: AppealStatus,
    pub op_user: String,
}
