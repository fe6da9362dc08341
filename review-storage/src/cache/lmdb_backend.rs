//! LMDB-backed page cache.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep cached pages in a
//! memory-mapped file that survives restarts.
//!
//! # Value Layout
//!
//! `[expires_at: 8 bytes, little-endian unix millis][payload]`
//!
//! Expiry is wall-clock based since entries outlive the process. An
//! expired entry reads as a miss and stays on disk until
//! [`LmdbCache::purge_expired`] runs.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

use super::traits::{CacheError, CacheLayer, CacheStats};

const HEADER_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    #[error("Failed to open database: {0}")]
    DbOpen(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Corrupt cache entry {key}")]
    Corrupt { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// LMDB-backed [`CacheLayer`].
///
/// # Example
///
/// ```ignore
/// let cache = LmdbCache::new("/var/cache/review", 64)?;
/// cache.set("review:76089:0:10", &bytes, Duration::from_secs(10)).await?;
/// ```
pub struct LmdbCache {
    env: Env,
    db: Database<Str, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl LmdbCache {
    /// Open (or create) a cache environment under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the memory map in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        let map_size = max_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            LmdbCacheError::EnvOpen(format!("map size of {max_size_mb} MB overflows usize"))
        })?;
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        })
    }

    fn read_entry(&self, key: &str) -> Result<Option<Vec<u8>>, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let Some(bytes) = self.db.get(&rtxn, key).map_err(txn_err)? else {
            return Ok(None);
        };
        if bytes.len() < HEADER_LEN {
            return Err(LmdbCacheError::Corrupt {
                key: key.to_string(),
            });
        }
        let (header, payload) = bytes.split_at(HEADER_LEN);
        let mut expiry = [0u8; HEADER_LEN];
        expiry.copy_from_slice(header);
        if u64::from_le_bytes(expiry) <= now_millis() {
            return Ok(None);
        }
        Ok(Some(payload.to_vec()))
    }

    fn write_entry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), LmdbCacheError> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at = now_millis().saturating_add(ttl_ms);

        let mut full = Vec::with_capacity(HEADER_LEN + value.len());
        full.extend_from_slice(&expires_at.to_le_bytes());
        full.extend_from_slice(value);

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db.put(&mut wtxn, key, &full).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)
    }

    /// Delete every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> Result<u64, LmdbCacheError> {
        let now = now_millis();
        let expired: Vec<String> = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            let mut keys = Vec::new();
            for item in self.db.iter(&rtxn).map_err(txn_err)? {
                let (key, bytes) = item.map_err(txn_err)?;
                let stale = match bytes.get(..HEADER_LEN) {
                    Some(header) => {
                        let mut expiry = [0u8; HEADER_LEN];
                        expiry.copy_from_slice(header);
                        u64::from_le_bytes(expiry) <= now
                    }
                    None => true,
                };
                if stale {
                    keys.push(key.to_string());
                }
            }
            keys
        };

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let mut deleted = 0;
        for key in &expired {
            if self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }

    fn entry_count(&self) -> u64 {
        self.env
            .read_txn()
            .ok()
            .and_then(|rtxn| self.db.len(&rtxn).ok())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheLayer for LmdbCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        match self.read_entry(key)? {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::Miss)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.write_entry(key, value, ttl)?;
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            entry_count: self.entry_count(),
        }
    }
}
