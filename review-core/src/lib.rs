//! Review Core - Record Types and Error Taxonomy
//!
//! Pure data structures shared by the storage and service crates: the
//! review, reply and appeal records, their typed identifiers, the page key
//! used by the read path, request deadlines and the error taxonomy.

pub mod context;
pub mod entities;
pub mod error;
pub mod identity;
pub mod page;
pub mod time_format;

pub use context::RequestContext;
pub use entities::{
    Appeal, AppealParam, AppealStatus, AuditAppealParam, NewReview, RecordKind, Reply,
    ReplyParam, Review, ReviewStatus,
};
pub use error::{ReviewError, ReviewResult};
pub use identity::{
    AppealId, IdSource, OrderId, ReplyId, ReviewId, SnowflakeIdSource, StoreId, UserId,
};
pub use page::{PageKey, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PAGE_KEY_PREFIX};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
