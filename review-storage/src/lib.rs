//! Collaborators behind the review catalog.
//!
//! - [`DurableStore`]: authoritative records with atomic batch commits
//! - [`SearchIndex`]: paginated, store-filtered copy of reviews
//! - [`cache`]: page cache backends and the coalesced cache-aside reader
//! - [`PageSource`]: the read strategy the use case talks to

use std::sync::Arc;

pub mod cache;
pub mod durable;
pub mod error;
pub mod memory_store;
pub mod page_source;
pub mod search;

pub use cache::{
    CacheConfig, CacheError, CacheLayer, CacheStats, Coalescer, CoalescerStats, InMemoryCache,
    LmdbCache, LmdbCacheError, ReadCoalescer, DEFAULT_INDEX, DEFAULT_PAGE_TTL,
};
pub use durable::{DurableStore, WriteBatch, WriteOp};
pub use error::{StoreError, StoreResult};
pub use memory_store::InMemoryStore;
pub use page_source::{decode_page, DirectIndexPageSource, PageSource, ReadStrategy, ReviewPage};
pub use search::{InMemorySearchIndex, SearchError, SearchHit, SearchHits, SearchIndex, SearchQuery};

/// Serialized page payload as stored in the cache and shared between
/// coalesced callers.
pub type PageBytes = Arc<[u8]>;
