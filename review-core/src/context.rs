//! Request deadlines.
//!
//! Every I/O call made on behalf of a request is bounded by the request's
//! [`RequestContext`]. Cancellation is drop: when a caller abandons the
//! future, in-flight work stops at its next suspension point.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ReviewError, ReviewResult};

/// Per-request execution context carrying an optional deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drive `fut` to completion unless the deadline passes first.
    ///
    /// On expiry the future is dropped and `DeadlineExceeded` is returned.
    pub async fn within<F>(&self, fut: F) -> ReviewResult<F::Output>
    where
        F: Future,
    {
        match self.deadline {
            None => Ok(fut.await),
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| ReviewError::DeadlineExceeded),
        }
    }
}
