//! Cache backend trait.

use std::time::Duration;

use async_trait::async_trait;
use review_core::ReviewError;
use thiserror::Error;

/// Outcome of a failed cache call.
///
/// `Miss` is an expected result and sends the reader to the index.
/// `Backend` is an outage and must not be papered over.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,

    #[error("cache backend failure: {0}")]
    Backend(String),
}

impl From<CacheError> for ReviewError {
    fn from(e: CacheError) -> Self {
        ReviewError::CacheFailure(e.to_string())
    }
}

/// Key-value byte cache with hard per-entry expiry.
///
/// An expired entry must read as `Miss`, never as a hit.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    /// Includes reads of expired entries.
    pub misses: u64,
    pub sets: u64,
    /// Entries currently held, expired ones included until purged.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
