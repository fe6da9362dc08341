//! Read strategies for store review pages and page decoding.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use review_core::{PageKey, RequestContext, Review, ReviewError, ReviewResult};
use tracing::warn;

use crate::cache::{CacheLayer, ReadCoalescer};
use crate::search::{SearchHits, SearchIndex, SearchQuery};
use crate::PageBytes;

/// Where a page of reviews comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Serialized [`SearchHits`] for the page addressed by `key`.
    async fn fetch_page(&self, key: &PageKey, ctx: &RequestContext) -> ReviewResult<PageBytes>;
}

#[async_trait]
impl<C, I> PageSource for ReadCoalescer<C, I>
where
    C: CacheLayer + ?Sized + 'static,
    I: SearchIndex + ?Sized + 'static,
{
    async fn fetch_page(&self, key: &PageKey, ctx: &RequestContext) -> ReviewResult<PageBytes> {
        self.fetch(key, ctx).await
    }
}

/// Queries the index on every call with no cache and no coalescing.
pub struct DirectIndexPageSource<I: ?Sized> {
    index: Arc<I>,
    index_name: String,
}

impl<I: SearchIndex + ?Sized> DirectIndexPageSource<I> {
    pub fn new(index: Arc<I>, index_name: impl Into<String>) -> Self {
        Self {
            index,
            index_name: index_name.into(),
        }
    }
}

#[async_trait]
impl<I: SearchIndex + ?Sized> PageSource for DirectIndexPageSource<I> {
    async fn fetch_page(&self, key: &PageKey, ctx: &RequestContext) -> ReviewResult<PageBytes> {
        let query = SearchQuery::for_page(self.index_name.as_str(), key);
        let hits = ctx.within(self.index.search(&query)).await??;
        let bytes =
            serde_json::to_vec(&hits).map_err(|e| ReviewError::SearchFailure(e.to_string()))?;
        Ok(PageBytes::from(bytes))
    }
}

/// Which [`PageSource`] serves store listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Cache-aside with request coalescing.
    #[default]
    Cached,
    /// Straight to the search index.
    Direct,
}

impl fmt::Display for ReadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStrategy::Cached => f.write_str("cached"),
            ReadStrategy::Direct => f.write_str("direct"),
        }
    }
}

impl FromStr for ReadStrategy {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cached" => Ok(ReadStrategy::Cached),
            "direct" => Ok(ReadStrategy::Direct),
            other => Err(ReviewError::validation(
                "read_strategy",
                format!("expected cached or direct, got {other}"),
            )),
        }
    }
}

/// A decoded page of reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewPage {
    /// Matching reviews across all pages.
    pub total: u64,
    pub reviews: Vec<Review>,
    /// One `DeserializationSkip` per record that failed to decode.
    pub skipped: Vec<ReviewError>,
}

/// Decode a serialized page.
///
/// Records that fail to decode are logged and left out; a payload that is
/// not a hits envelope at all fails the whole read.
pub fn decode_page(bytes: &[u8]) -> ReviewResult<ReviewPage> {
    let envelope: SearchHits = serde_json::from_slice(bytes)
        .map_err(|e| ReviewError::CacheFailure(format!("undecodable page payload: {e}")))?;

    let mut page = ReviewPage {
        total: envelope.total,
        reviews: Vec::with_capacity(envelope.hits.len()),
        skipped: Vec::new(),
    };
    for hit in envelope.hits {
        match serde_json::from_value::<Review>(hit.source) {
            Ok(review) => page.reviews.push(review),
            Err(e) => {
                warn!(id = %hit.id, error = %e, "skipping undecodable review record");
                page.skipped.push(ReviewError::DeserializationSkip {
                    id: hit.id,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::InMemorySearchIndex;
    use chrono::Utc;
    use review_core::{NewReview, OrderId, ReviewId, StoreId, UserId};
    use serde_json::json;

    fn review(id: u64, store: u64) -> Review {
        Review::from_new(
            ReviewId::new(id),
            NewReview {
                order_id: OrderId::new(id + 1000),
                user_id: UserId::new(1),
                store_id: StoreId::new(store),
                score: 4,
                service_score: 4,
                express_score: 4,
                content: format!("review {id}"),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_decode_skips_bad_records() {
        let good = serde_json::to_value(review(1, 7)).unwrap();
        let payload = json!({
            "total": 3,
            "hits": [
                { "_id": "1", "_source": good },
                { "_id": "2", "_source": { "review_id": "not a number", "store_id": 7 } },
                { "_id": "3", "_source": { "review_id": 3 } },
            ]
        });

        let page = decode_page(&serde_json::to_vec(&payload).unwrap()).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.reviews.len(), 1);
        assert_eq!(page.reviews[0].review_id, ReviewId::new(1));
        let skipped: Vec<_> = page
            .skipped
            .iter()
            .map(|e| match e {
                ReviewError::DeserializationSkip { id, .. } => id.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(skipped, vec!["2", "3"]);
    }

    #[test]
    fn test_decode_rejects_non_envelope() {
        assert!(matches!(
            decode_page(b"not json"),
            Err(ReviewError::CacheFailure(_))
        ));
        assert!(matches!(
            decode_page(br#"{"hits": []}"#),
            Err(ReviewError::CacheFailure(_))
        ));
    }

    #[test]
    fn test_read_strategy_parse() {
        assert_eq!("cached".parse::<ReadStrategy>().unwrap(), ReadStrategy::Cached);
        assert_eq!(" Direct ".parse::<ReadStrategy>().unwrap(), ReadStrategy::Direct);
        assert!("redis".parse::<ReadStrategy>().is_err());
        assert_eq!(ReadStrategy::default().to_string(), "cached");
    }

    #[tokio::test]
    async fn test_direct_source_queries_every_time() {
        let index = Arc::new(InMemorySearchIndex::new("review"));
        index.index_review(&review(1, 7)).unwrap();
        index.index_review(&review(2, 7)).unwrap();
        let source = DirectIndexPageSource::new(Arc::clone(&index), "review");
        let key = PageKey::from_page(StoreId::new(7), 1, 10);
        let ctx = RequestContext::background();

        let first = source.fetch_page(&key, &ctx).await.unwrap();
        let second = source.fetch_page(&key, &ctx).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(index.query_count(), 2);

        let page = decode_page(&first).unwrap();
        assert_eq!(page.reviews.len(), 2);
        assert!(page.skipped.is_empty());
    }
}
