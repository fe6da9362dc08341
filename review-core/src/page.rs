//! Page addressing for the "reviews by store" read path.
//!
//! A [`PageKey`] names one `(store, offset, limit)` window of search results.
//! It is the unit of caching and of request coalescing, and it is never
//! persisted.

use std::fmt;

use crate::identity::StoreId;

/// Page size used when the requested size is zero, negative or too large.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u64 = 50;

/// Leading segment of every canonical page cache key.
pub const PAGE_KEY_PREFIX: &str = "review";

/// Canonical address of one page of a store's reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    store_id: StoreId,
    offset: u64,
    limit: u64,
}

impl PageKey {
    /// Create a key from an already normalized window.
    pub fn new(store_id: StoreId, offset: u64, limit: u64) -> Self {
        Self {
            store_id,
            offset,
            limit,
        }
    }

    /// Normalize caller-facing `page`/`size` arguments into a key.
    ///
    /// `page` below 1 becomes 1. `size` outside `1..=MAX_PAGE_SIZE` becomes
    /// [`DEFAULT_PAGE_SIZE`]. The offset is `(page - 1) * size`.
    pub fn from_page(store_id: StoreId, page: i64, size: i64) -> Self {
        let page = if page <= 0 { 1 } else { page as u64 };
        let size = match u64::try_from(size) {
            Ok(s) if s > 0 && s <= MAX_PAGE_SIZE => s,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self {
            store_id,
            offset: (page - 1).saturating_mul(size),
            limit: size,
        }
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Canonical cache key: `review:{store_id}:{offset}:{limit}`.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            PAGE_KEY_PREFIX, self.store_id, self.offset, self.limit
        )
    }

    /// Parse a canonical cache key back into its window.
    ///
    /// Returns `None` if the prefix is wrong, a segment is missing or extra,
    /// or a number fails to parse.
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split(':');
        if parts.next()? != PAGE_KEY_PREFIX {
            return None;
        }
        let store_id = parts.next()?.parse::<u64>().ok()?;
        let offset = parts.next()?.parse::<u64>().ok()?;
        let limit = parts.next()?.parse::<u64>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(StoreId::new(store_id), offset, limit))
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const STORE: StoreId = StoreId::new(76089);

    #[test]
    fn test_page_zero_matches_page_one() {
        assert_eq!(
            PageKey::from_page(STORE, 0, 10),
            PageKey::from_page(STORE, 1, 10)
        );
        assert_eq!(PageKey::from_page(STORE, -3, 10).offset(), 0);
    }

    #[test]
    fn test_out_of_range_sizes_use_default() {
        for size in [0, -5, 51, i64::MAX, i64::MIN] {
            assert_eq!(
                PageKey::from_page(STORE, 1, size).limit(),
                DEFAULT_PAGE_SIZE,
                "size {size}"
            );
        }
    }

    #[test]
    fn test_max_size_is_preserved() {
        assert_eq!(PageKey::from_page(STORE, 1, 50).limit(), 50);
        assert_eq!(PageKey::from_page(STORE, 1, 1).limit(), 1);
    }

    #[test]
    fn test_offset_from_page_and_size() {
        let key = PageKey::from_page(STORE, 3, 20);
        assert_eq!(key.offset(), 40);
        assert_eq!(key.limit(), 20);
    }

    #[test]
    fn test_huge_page_saturates() {
        let key = PageKey::from_page(STORE, i64::MAX, 50);
        assert_eq!(key.offset(), u64::MAX);
    }

    #[test]
    fn test_cache_key_format() {
        let key = PageKey::new(STORE, 0, 10);
        assert_eq!(key.cache_key(), "review:76089:0:10");
        assert_eq!(key.to_string(), "review:76089:0:10");
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        assert_eq!(PageKey::parse("review:1:2"), None);
        assert_eq!(PageKey::parse("reply:1:2:3"), None);
        assert_eq!(PageKey::parse("review:1:2:3:4"), None);
        assert_eq!(PageKey::parse("review:x:2:3"), None);
        assert_eq!(PageKey::parse(""), None);
    }

    proptest! {
        /// Normalized sizes always land in `1..=MAX_PAGE_SIZE`.
        #[test]
        fn prop_limit_in_range(page in any::<i64>(), size in any::<i64>()) {
            let key = PageKey::from_page(STORE, page, size);
            prop_assert!(key.limit() >= 1 && key.limit() <= MAX_PAGE_SIZE);
        }

        /// In-range sizes are never rewritten.
        #[test]
        fn prop_valid_size_preserved(page in 1i64..10_000, size in 1i64..=50) {
            let key = PageKey::from_page(STORE, page, size);
            prop_assert_eq!(key.limit(), size as u64);
            prop_assert_eq!(key.offset(), (page as u64 - 1) * size as u64);
        }

        /// The cache key parses back to the same window.
        #[test]
        fn prop_cache_key_parses_back(store in any::<u64>(), offset in any::<u64>(), limit in 1u64..=50) {
            let key = PageKey::new(StoreId::new(store), offset, limit);
            prop_assert_eq!(PageKey::parse(&key.cache_key()), Some(key));
        }
    }
}
