//! Error taxonomy for review operations

use thiserror::Error;

use crate::entities::RecordKind;
use crate::identity::{OrderId, ReviewId, StoreId};

/// Master error type for review operations.
///
/// `Clone` so that one coalesced upstream result can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Order {order_id} has already been reviewed")]
    AlreadyReviewed { order_id: OrderId },

    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: u64 },

    #[error("Review {review_id} has already been replied to")]
    AlreadyReplied { review_id: ReviewId },

    #[error("Store {store_id} does not own review {review_id}")]
    Unauthorized {
        review_id: ReviewId,
        store_id: StoreId,
    },

    #[error("Review {review_id} already has an audited appeal")]
    AppealAlreadyAudited { review_id: ReviewId },

    #[error("Invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Durable store failure: {0}")]
    StoreFailure(String),

    #[error("Cache failure: {0}")]
    CacheFailure(String),

    #[error("Search failure: {0}")]
    SearchFailure(String),

    /// Raised per record inside a page; the record is dropped, the page is not.
    #[error("Skipped undecodable record {id}: {reason}")]
    DeserializationSkip { id: String, reason: String },

    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

impl ReviewError {
    /// Create a Validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a NotFound error for a record.
    pub fn not_found(kind: RecordKind, id: impl Into<u64>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether the error was raised by a collaborator rather than by a
    /// business rule. Callers above this layer own the retry policy for
    /// these.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::StoreFailure(_)
                | Self::CacheFailure(_)
                | Self::SearchFailure(_)
                | Self::DeadlineExceeded
        )
    }
}

/// Result type alias for review operations.
pub type ReviewResult<T> = Result<T, ReviewError>;
