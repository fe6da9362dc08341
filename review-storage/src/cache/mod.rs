//! Page cache and request coalescing.
//!
//! Pages of search results are cached as serialized bytes under their
//! canonical page key with a short hard expiry. Writes never invalidate
//! cached pages; staleness is bounded by the TTL alone.
//!
//! # Example
//!
//! ```ignore
//! let reader = ReadCoalescer::new(cache, index, CacheConfig::default());
//!
//! // Concurrent identical calls share one cache lookup and index query
//! let key = PageKey::from_page(store_id, 1, 10);
//! let bytes = reader.fetch(&key, &RequestContext::background()).await?;
//! ```

pub mod coalescer;
pub mod lmdb_backend;
pub mod memory;
pub mod read_through;
pub mod traits;

pub use coalescer::{Coalescer, CoalescerStats};
pub use lmdb_backend::{LmdbCache, LmdbCacheError};
pub use memory::InMemoryCache;
pub use read_through::{CacheConfig, ReadCoalescer, DEFAULT_INDEX, DEFAULT_PAGE_TTL};
pub use traits::{CacheError, CacheLayer, CacheStats};
