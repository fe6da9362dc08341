//! Search index collaborator.
//!
//! The index holds a denormalized copy of reviews, kept eventually consistent
//! with the durable store by an external sync. Hits are returned verbatim as
//! `_id`/`_source` pairs; decoding into records happens on the read path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use review_core::{PageKey, Review, ReviewError, StoreId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a [`SearchIndex`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Unknown index {0}")]
    UnknownIndex(String),

    #[error("Search backend failure: {0}")]
    Backend(String),
}

impl From<SearchError> for ReviewError {
    fn from(e: SearchError) -> Self {
        ReviewError::SearchFailure(e.to_string())
    }
}

/// One page query: equality on `store_id` plus an offset window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub index: String,
    pub store_id: StoreId,
    pub offset: u64,
    pub limit: u64,
}

impl SearchQuery {
    pub fn for_page(index: impl Into<String>, key: &PageKey) -> Self {
        Self {
            index: index.into(),
            store_id: key.store_id(),
            offset: key.offset(),
            limit: key.limit(),
        }
    }
}

/// A single raw hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: serde_json::Value,
}

/// Result envelope for one page. Also the cached payload format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    /// Matches across all pages, not just this one.
    pub total: u64,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, SearchError>;
}

/// In-memory index over one named collection. Documents are kept in
/// insertion order; re-indexing an id replaces it in place.
#[derive(Debug)]
pub struct InMemorySearchIndex {
    name: String,
    docs: RwLock<Vec<SearchHit>>,
    unavailable: AtomicBool,
    queries: AtomicU64,
}

impl InMemorySearchIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
            queries: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index a review under its id.
    pub fn index_review(&self, review: &Review) -> Result<(), SearchError> {
        let source =
            serde_json::to_value(review).map_err(|e| SearchError::Backend(e.to_string()))?;
        self.index_raw(review.review_id.to_string(), source)
    }

    /// Index an arbitrary document. Used to seed records the read path must
    /// skip.
    pub fn index_raw(
        &self,
        id: impl Into<String>,
        source: serde_json::Value,
    ) -> Result<(), SearchError> {
        let id = id.into();
        let mut docs = self
            .docs
            .write()
            .map_err(|_| SearchError::Backend("index lock poisoned".to_string()))?;
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.source = source,
            None => docs.push(SearchHit { id, source }),
        }
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of queries served, including failed ones.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, SearchError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SearchError::Backend("index unavailable".to_string()));
        }
        if query.index != self.name {
            return Err(SearchError::UnknownIndex(query.index.clone()));
        }

        let docs = self
            .docs
            .read()
            .map_err(|_| SearchError::Backend("index lock poisoned".to_string()))?;
        let store_id = query.store_id.as_u64();
        let matching: Vec<&SearchHit> = docs
            .iter()
            .filter(|d| d.source.get("store_id").and_then(|v| v.as_u64()) == Some(store_id))
            .collect();

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(SearchHits {
            total: matching.len() as u64,
            hits: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(store: u64, offset: u64, limit: u64) -> SearchQuery {
        SearchQuery::for_page("review", &PageKey::new(StoreId::new(store), offset, limit))
    }

    fn seeded() -> InMemorySearchIndex {
        let index = InMemorySearchIndex::new("review");
        for i in 1..=5u64 {
            index
                .index_raw(i.to_string(), json!({ "review_id": i, "store_id": 7 }))
                .unwrap();
        }
        index
            .index_raw("99", json!({ "review_id": 99, "store_id": 8 }))
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_filters_by_store_and_paginates() {
        let index = seeded();
        let page = index.search(&query(7, 2, 2)).await.unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<_> = page.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_offset_past_end_is_empty() {
        let index = seeded();
        let page = index.search(&query(7, 50, 10)).await.unwrap();
        assert_eq!(page.total, 5);
        assert!(page.hits.is_empty());
    }

    #[tokio::test]
    async fn test_reindex_replaces_document() {
        let index = seeded();
        index
            .index_raw("1", json!({ "review_id": 1, "store_id": 8 }))
            .unwrap();
        assert_eq!(index.search(&query(7, 0, 10)).await.unwrap().total, 4);
        assert_eq!(index.search(&query(8, 0, 10)).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_unknown_index_and_outage() {
        let index = seeded();
        let mut q = query(7, 0, 10);
        q.index = "reply".to_string();
        assert_eq!(
            index.search(&q).await,
            Err(SearchError::UnknownIndex("reply".to_string()))
        );

        index.set_unavailable(true);
        assert!(matches!(
            index.search(&query(7, 0, 10)).await,
            Err(SearchError::Backend(_))
        ));
        assert_eq!(index.query_count(), 2);
    }

    #[test]
    fn test_hits_envelope_shape() {
        let hits = SearchHits {
            total: 1,
            hits: vec![SearchHit {
                id: "1".to_string(),
                source: json!({ "store_id": 7 }),
            }],
        };
        let value = serde_json::to_value(&hits).unwrap();
        assert_eq!(value["hits"][0]["_id"], "1");
        assert_eq!(value["hits"][0]["_source"]["store_id"], 7);
    }
}
