//! Durable store errors.

use review_core::{RecordKind, ReviewError};
use thiserror::Error;

/// Failure reported by a [`DurableStore`](crate::DurableStore).
///
/// `UniqueViolation` and `ConditionFailed` are expected outcomes of racing
/// writers; callers translate them into business errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: u64 },

    #[error("Unique constraint {constraint} violated")]
    UniqueViolation { constraint: &'static str },

    #[error("Condition failed: {reason}")]
    ConditionFailed { reason: String },

    #[error("Store backend failure: {0}")]
    Backend(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ReviewError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => ReviewError::NotFound { kind, id },
            other => ReviewError::StoreFailure(other.to_string()),
        }
    }
}
