//! Review catalog service layer.
//!
//! [`ReviewUsecase`] validates requests, keeps the review/reply/appeal
//! tables consistent through atomic batches, and serves store listings
//! through a configurable [`PageSource`](review_storage::PageSource).
//! [`ServiceState`] wires it together from [`ServiceConfig`].

pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;
pub mod usecase;
pub mod validation;

pub use config::{CacheBackendKind, ConfigError, LogFormat, ServiceConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::ServiceState;
pub use telemetry::init_tracing;
pub use usecase::ReviewUsecase;
