//! In-process TTL cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::traits::{CacheError, CacheLayer, CacheStats};

#[derive(Debug)]
struct Entry {
    expires_at: Instant,
    value: Vec<u8>,
}

/// [`CacheLayer`] over a concurrent map.
///
/// Expiry is measured on the tokio clock so paused-time tests can advance
/// past a TTL. Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` holds an unexpired entry. Does not touch statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.expires_at > Instant::now())
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut purged = 0u64;
        self.entries.retain(|_, e| {
            let live = e.expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }
}

#[async_trait]
impl CacheLayer for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let now = Instant::now();
        let found = self
            .entries
            .get(key)
            .map(|e| (e.expires_at > now).then(|| e.value.clone()));

        match found {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Some(None) => {
                self.entries.remove_if(key, |_, e| e.expires_at <= now);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::Miss)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::Miss)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                expires_at: Instant::now() + ttl,
                value: value.to_vec(),
            },
        );
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        }
    }
}
