//! Request Validation
//!
//! Common checks as traits, plus one validator per use case. Every
//! validator runs before any I/O.

use review_core::{AppealParam, AppealStatus, AuditAppealParam, NewReview, ReplyParam, ReviewError, ReviewResult};

/// Longest accepted free-text field, in characters.
pub const MAX_TEXT_LEN: usize = 1000;

/// Trait for validating non-empty strings.
///
/// # Example
/// ```ignore
/// use review_service::validation::ValidateNonEmpty;
///
/// param.content.validate_non_empty("content")?;
/// ```
pub trait ValidateNonEmpty {
    /// Fails with `Validation` if the value is empty or whitespace-only.
    fn validate_non_empty(&self, field_name: &str) -> ReviewResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> ReviewResult<()> {
        if self.trim().is_empty() {
            return Err(ReviewError::validation(field_name, "must not be empty"));
        }
        Ok(())
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> ReviewResult<()> {
        self.as_str().validate_non_empty(field_name)
    }
}

/// Trait for bounding free-text length.
pub trait ValidateMaxLen {
    fn validate_max_len(&self, field_name: &str, max_chars: usize) -> ReviewResult<()>;
}

impl ValidateMaxLen for str {
    fn validate_max_len(&self, field_name: &str, max_chars: usize) -> ReviewResult<()> {
        let len = self.chars().count();
        if len > max_chars {
            return Err(ReviewError::validation(
                field_name,
                format!("must be at most {max_chars} characters, got {len}"),
            ));
        }
        Ok(())
    }
}

impl ValidateMaxLen for String {
    fn validate_max_len(&self, field_name: &str, max_chars: usize) -> ReviewResult<()> {
        self.as_str().validate_max_len(field_name, max_chars)
    }
}

/// Trait for validating numeric ranges.
pub trait ValidateRange {
    /// Validate that the value is positive (> 0).
    fn validate_positive(&self, field_name: &str) -> ReviewResult<()>;

    /// Validate that the value is within an inclusive range.
    fn validate_range(&self, field_name: &str, min: Self, max: Self) -> ReviewResult<()>
    where
        Self: Sized;
}

macro_rules! impl_validate_range {
    ($($t:ty),*) => {
        $(
            impl ValidateRange for $t {
                fn validate_positive(&self, field_name: &str) -> ReviewResult<()> {
                    if *self == 0 {
                        return Err(ReviewError::validation(field_name, "must be positive"));
                    }
                    Ok(())
                }

                fn validate_range(&self, field_name: &str, min: Self, max: Self) -> ReviewResult<()> {
                    if *self < min || *self > max {
                        return Err(ReviewError::validation(
                            field_name,
                            format!("must be between {} and {}", min, max),
                        ));
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_validate_range!(i32, u64);

fn validate_text(value: &str, field_name: &str) -> ReviewResult<()> {
    value.validate_non_empty(field_name)?;
    value.validate_max_len(field_name, MAX_TEXT_LEN)
}

pub fn validate_new_review(new: &NewReview) -> ReviewResult<()> {
    new.order_id.as_u64().validate_positive("order_id")?;
    new.user_id.as_u64().validate_positive("user_id")?;
    new.store_id.as_u64().validate_positive("store_id")?;
    new.score.validate_range("score", 1, 5)?;
    new.service_score.validate_range("service_score", 1, 5)?;
    new.express_score.validate_range("express_score", 1, 5)?;
    validate_text(&new.content, "content")
}

pub fn validate_reply(param: &ReplyParam) -> ReviewResult<()> {
    param.review_id.as_u64().validate_positive("review_id")?;
    param.store_id.as_u64().validate_positive("store_id")?;
    validate_text(&param.content, "content")
}

pub fn validate_appeal(param: &AppealParam) -> ReviewResult<()> {
    param.review_id.as_u64().validate_positive("review_id")?;
    param.store_id.as_u64().validate_positive("store_id")?;
    validate_text(&param.reason, "reason")?;
    validate_text(&param.content, "content")
}

pub fn validate_audit(param: &AuditAppealParam) -> ReviewResult<()> {
    param.appeal_id.as_u64().validate_positive("appeal_id")?;
    param.review_id.as_u64().validate_positive("review_id")?;
    if param.status == AppealStatus::Pending {
        return Err(ReviewError::validation(
            "status",
            "an audit must approve or reject",
        ));
    }
    param.op_user.validate_non_empty("op_user")
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_core::{AppealId, OrderId, ReviewId, StoreId, UserId};

    fn field_of(result: ReviewResult<()>) -> String {
        match result {
            Err(ReviewError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn new_review() -> NewReview {
        NewReview {
            order_id: OrderId::new(1),
            user_id: UserId::new(2),
            store_id: StoreId::new(3),
            score: 5,
            service_score: 1,
            express_score: 3,
            content: "great".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_non_empty_str() {
        assert!("hello".validate_non_empty("name").is_ok());
        assert!("".validate_non_empty("name").is_err());
        assert!("   ".validate_non_empty("name").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(5i32.validate_range("score", 1, 5).is_ok());
        assert!(0i32.validate_range("score", 1, 5).is_err());
        assert!(6i32.validate_range("score", 1, 5).is_err());
        assert!(0u64.validate_positive("id").is_err());
    }

    #[test]
    fn test_max_len_counts_chars_not_bytes() {
        let text = "好".repeat(MAX_TEXT_LEN);
        assert!(text.validate_max_len("content", MAX_TEXT_LEN).is_ok());
        let text = "a".repeat(MAX_TEXT_LEN + 1);
        assert!(text.validate_max_len("content", MAX_TEXT_LEN).is_err());
    }

    #[test]
    fn test_new_review_rules() {
        assert!(validate_new_review(&new_review()).is_ok());

        let mut bad = new_review();
        bad.order_id = OrderId::new(0);
        assert_eq!(field_of(validate_new_review(&bad)), "order_id");

        let mut bad = new_review();
        bad.express_score = 6;
        assert_eq!(field_of(validate_new_review(&bad)), "express_score");

        let mut bad = new_review();
        bad.content = String::new();
        assert_eq!(field_of(validate_new_review(&bad)), "content");
    }

    #[test]
    fn test_appeal_requires_reason() {
        let param = AppealParam {
            review_id: ReviewId::new(1),
            store_id: StoreId::new(2),
            reason: " ".to_string(),
            content: "fake review".to_string(),
            ..Default::default()
        };
        assert_eq!(field_of(validate_appeal(&param)), "reason");
    }

    #[test]
    fn test_audit_rules() {
        let mut param = AuditAppealParam {
            appeal_id: AppealId::new(1),
            review_id: ReviewId::new(2),
            status: AppealStatus::Pending,
            op_user: "ops".to_string(),
        };
        assert_eq!(field_of(validate_audit(&param)), "status");

        param.status = AppealStatus::Approved;
        assert!(validate_audit(&param).is_ok());

        param.op_user = String::new();
        assert_eq!(field_of(validate_audit(&param)), "op_user");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use review_test_utils::generators::{arb_content, arb_new_review};

        proptest! {
            #[test]
            fn generated_requests_validate(new in arb_new_review()) {
                prop_assert!(validate_new_review(&new).is_ok());
            }

            #[test]
            fn out_of_range_scores_fail(new in arb_new_review(), score in prop_oneof![i32::MIN..1, 6..i32::MAX]) {
                let bad = NewReview { score, ..new };
                prop_assert_eq!(field_of(validate_new_review(&bad)), "score");
            }

            #[test]
            fn overlong_padding_fails(content in arb_content()) {
                let padded = format!("{content}{}", "x".repeat(MAX_TEXT_LEN));
                prop_assert!(padded.validate_max_len("content", MAX_TEXT_LEN).is_err());
                prop_assert!(content.validate_max_len("content", MAX_TEXT_LEN).is_ok());
            }
        }
    }
}
