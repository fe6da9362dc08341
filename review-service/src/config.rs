//! Service Configuration Module
//!
//! Read strategy, cache backend, request deadlines, ID node and logging
//! settings. Loaded from `REVIEW_*` environment variables with defaults
//! suitable for development.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use review_core::identity::MAX_NODE_ID;
use review_storage::{CacheConfig, ReadStrategy, DEFAULT_INDEX, DEFAULT_PAGE_TTL};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}: expected {expected}")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to open cache backend: {0}")]
    CacheBackend(String),
}

// ============================================================================
// ENUMS
// ============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Which [`CacheLayer`](review_storage::CacheLayer) holds serialized pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Lmdb,
}

impl FromStr for CacheBackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "lmdb" => Ok(CacheBackendKind::Lmdb),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendKind::Memory => f.write_str("memory"),
            CacheBackendKind::Lmdb => f.write_str("lmdb"),
        }
    }
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    // ========================================================================
    // Read Path
    // ========================================================================
    /// Cache-aside with coalescing, or straight to the index.
    pub read_strategy: ReadStrategy,

    /// Expiry of cached pages.
    pub page_cache_ttl: Duration,

    /// Search index holding review documents.
    pub search_index: String,

    pub cache_backend: CacheBackendKind,

    /// LMDB environment directory; required for the LMDB backend.
    pub lmdb_path: Option<PathBuf>,

    pub lmdb_max_size_mb: usize,

    // ========================================================================
    // Requests
    // ========================================================================
    /// Deadline applied to each request; `None` means unbounded.
    pub request_timeout: Option<Duration>,

    /// Node id mixed into generated identifiers.
    pub node_id: u16,

    // ========================================================================
    // Logging
    // ========================================================================
    /// Filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            read_strategy: ReadStrategy::Cached,
            page_cache_ttl: DEFAULT_PAGE_TTL,
            search_index: DEFAULT_INDEX.to_string(),
            cache_backend: CacheBackendKind::Memory,
            lmdb_path: None,
            lmdb_max_size_mb: 64,
            request_timeout: Some(Duration::from_millis(3000)),
            node_id: 0,
            log_filter: "review_service=info,review_storage=info,warn".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `REVIEW_READ_STRATEGY`: "cached" or "direct" (default: cached)
    /// - `REVIEW_PAGE_CACHE_TTL_SECS`: Page expiry in seconds (default: 10)
    /// - `REVIEW_SEARCH_INDEX`: Index name (default: review)
    /// - `REVIEW_CACHE_BACKEND`: "memory" or "lmdb" (default: memory)
    /// - `REVIEW_LMDB_PATH`: LMDB directory (no default)
    /// - `REVIEW_LMDB_MAX_SIZE_MB`: LMDB map size (default: 64)
    /// - `REVIEW_REQUEST_TIMEOUT_MS`: Per-request deadline, 0 = none (default: 3000)
    /// - `REVIEW_NODE_ID`: ID node, 0..=1023 (default: 0)
    /// - `REVIEW_LOG_FILTER`: Filter used when `RUST_LOG` is unset
    /// - `REVIEW_LOG_FORMAT`: "text" or "json" (default: text)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Numeric values that fail to parse fall back to their default; an
    /// unknown enum value is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let read_strategy = match lookup("REVIEW_READ_STRATEGY") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                var: "REVIEW_READ_STRATEGY",
                value,
                expected: "cached or direct",
            })?,
            None => defaults.read_strategy,
        };

        let page_cache_ttl = lookup("REVIEW_PAGE_CACHE_TTL_SECS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.page_cache_ttl);

        let search_index = lookup("REVIEW_SEARCH_INDEX")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.search_index);

        let cache_backend = match lookup("REVIEW_CACHE_BACKEND") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                var: "REVIEW_CACHE_BACKEND",
                value,
                expected: "memory or lmdb",
            })?,
            None => defaults.cache_backend,
        };

        let lmdb_path = lookup("REVIEW_LMDB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let lmdb_max_size_mb = lookup("REVIEW_LMDB_MAX_SIZE_MB")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.lmdb_max_size_mb);

        let request_timeout = match lookup("REVIEW_REQUEST_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.request_timeout,
        };

        let node_id = lookup("REVIEW_NODE_ID")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.node_id);

        let log_filter = lookup("REVIEW_LOG_FILTER")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        let log_format = match lookup("REVIEW_LOG_FORMAT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                var: "REVIEW_LOG_FORMAT",
                value,
                expected: "text or json",
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            read_strategy,
            page_cache_ttl,
            search_index,
            cache_backend,
            lmdb_path,
            lmdb_max_size_mb,
            request_timeout,
            node_id,
            log_filter,
            log_format,
        })
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_cache_ttl.is_zero() {
            return Err(ConfigError::Invalid(
                "page cache TTL must be greater than zero".to_string(),
            ));
        }
        if self.node_id > MAX_NODE_ID {
            return Err(ConfigError::Invalid(format!(
                "node id {} exceeds {}",
                self.node_id, MAX_NODE_ID
            )));
        }
        if self.cache_backend == CacheBackendKind::Lmdb && self.lmdb_path.is_none() {
            return Err(ConfigError::Invalid(
                "REVIEW_LMDB_PATH is required for the lmdb cache backend".to_string(),
            ));
        }
        if self.lmdb_max_size_mb == 0 {
            return Err(ConfigError::Invalid(
                "LMDB map size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Read-path settings for the storage layer.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl(self.page_cache_ttl)
            .with_index(self.search_index.clone())
    }
}
