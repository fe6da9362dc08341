//! Error Types for the review service boundary
//!
//! - ErrorCode enum for categorizing errors, with HTTP-style status codes
//! - ApiError struct for structured error responses
//! - Mapping from the domain taxonomy in [`ReviewError`]

use review_core::ReviewError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for responses leaving the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Client Errors
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Caller does not own the targeted record
    Forbidden,

    /// Requested record does not exist
    EntityNotFound,

    /// A review already exists for the order
    EntityAlreadyExists,

    /// Operation conflicts with the record's current state
    StateConflict,

    // ========================================================================
    // Server Errors
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Durable store operation failed
    DatabaseError,

    /// Cache or search backend unavailable
    ServiceUnavailable,

    /// Request deadline passed
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationFailed => 400,
            ErrorCode::Forbidden => 403,
            ErrorCode::EntityNotFound => 404,
            ErrorCode::EntityAlreadyExists | ErrorCode::StateConflict => 409,
            ErrorCode::InternalError | ErrorCode::DatabaseError => 500,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::Timeout => 504,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::StateConflict => "Operation conflicts with current state",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::Timeout => "Operation timed out",
        }
    }

    /// Whether a client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ServiceUnavailable | ErrorCode::Timeout | ErrorCode::DatabaseError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (offending field, record id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// DOMAIN ERROR CONVERSION
// ============================================================================

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        let message = err.to_string();
        match err {
            ReviewError::Validation { field, .. } => {
                ApiError::new(ErrorCode::ValidationFailed, message)
                    .with_details(serde_json::json!({ "field": field }))
            }
            ReviewError::Unauthorized {
                review_id,
                store_id,
            } => ApiError::new(ErrorCode::Forbidden, message).with_details(serde_json::json!({
                "review_id": review_id,
                "store_id": store_id,
            })),
            ReviewError::NotFound { kind, id } => ApiError::new(ErrorCode::EntityNotFound, message)
                .with_details(serde_json::json!({ "kind": kind.to_string(), "id": id })),
            ReviewError::AlreadyReviewed { .. } => {
                ApiError::new(ErrorCode::EntityAlreadyExists, message)
            }
            ReviewError::AlreadyReplied { .. } | ReviewError::AppealAlreadyAudited { .. } => {
                ApiError::new(ErrorCode::StateConflict, message)
            }
            ReviewError::StoreFailure(_) => ApiError::new(ErrorCode::DatabaseError, message),
            ReviewError::CacheFailure(_) | ReviewError::SearchFailure(_) => {
                ApiError::new(ErrorCode::ServiceUnavailable, message)
            }
            ReviewError::DeadlineExceeded => ApiError::new(ErrorCode::Timeout, message),
            ReviewError::DeserializationSkip { .. } => {
                ApiError::new(ErrorCode::InternalError, message)
            }
        }
    }
}

/// Result type for service boundary operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use review_core::{OrderId, RecordKind, ReviewId, StoreId};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::ValidationFailed.status_code(), 400);
        assert_eq!(ErrorCode::Forbidden.status_code(), 403);
        assert_eq!(ErrorCode::StateConflict.status_code(), 409);
        assert_eq!(ErrorCode::Timeout.status_code(), 504);
    }

    #[test]
    fn test_domain_errors_map_to_codes() {
        let cases = [
            (
                ReviewError::AlreadyReviewed {
                    order_id: OrderId::new(1),
                },
                ErrorCode::EntityAlreadyExists,
            ),
            (
                ReviewError::AlreadyReplied {
                    review_id: ReviewId::new(1),
                },
                ErrorCode::StateConflict,
            ),
            (
                ReviewError::Unauthorized {
                    review_id: ReviewId::new(1),
                    store_id: StoreId::new(2),
                },
                ErrorCode::Forbidden,
            ),
            (
                ReviewError::not_found(RecordKind::Review, 3u64),
                ErrorCode::EntityNotFound,
            ),
            (
                ReviewError::CacheFailure("down".into()),
                ErrorCode::ServiceUnavailable,
            ),
            (ReviewError::DeadlineExceeded, ErrorCode::Timeout),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code, code);
        }
    }

    #[test]
    fn test_validation_details_name_the_field() {
        let api = ApiError::from(ReviewError::validation("score", "must be between 1 and 5"));
        assert_eq!(api.details.unwrap()["field"], "score");
        assert!(api.message.contains("must be between 1 and 5"));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(ApiError::from_code(ErrorCode::Timeout)).unwrap();
        assert_eq!(json["code"], "TIMEOUT");
        assert_eq!(json["message"], "Operation timed out");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_retryable_codes() {
        assert!(ErrorCode::ServiceUnavailable.is_retryable());
        assert!(!ErrorCode::StateConflict.is_retryable());
    }
}
