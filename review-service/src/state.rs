//! Service wiring.

use std::sync::Arc;

use review_core::{IdSource, RequestContext, SnowflakeIdSource};
use review_storage::{
    CacheLayer, DirectIndexPageSource, DurableStore, InMemoryCache, LmdbCache, PageSource,
    ReadCoalescer, ReadStrategy, SearchIndex,
};
use tracing::info;

use crate::config::{CacheBackendKind, ConfigError, ServiceConfig};
use crate::usecase::ReviewUsecase;

/// Read coalescer over trait-object collaborators, as built from configuration.
pub type ServiceReadCoalescer = ReadCoalescer<dyn CacheLayer, dyn SearchIndex>;

/// Everything a request handler needs.
#[derive(Clone)]
pub struct ServiceState {
    pub config: ServiceConfig,
    pub usecase: Arc<ReviewUsecase>,
    /// Page cache; `None` under the direct read strategy.
    pub cache: Option<Arc<dyn CacheLayer>>,
}

impl ServiceState {
    /// Assemble the use cases from configuration and the externally owned
    /// store and index.
    pub fn from_config(
        config: ServiceConfig,
        store: Arc<dyn DurableStore>,
        index: Arc<dyn SearchIndex>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let ids: Arc<dyn IdSource> = Arc::new(SnowflakeIdSource::new(config.node_id));

        let (pages, cache): (Arc<dyn PageSource>, Option<Arc<dyn CacheLayer>>) =
            match config.read_strategy {
                ReadStrategy::Direct => (
                    Arc::new(DirectIndexPageSource::new(index, config.search_index.clone())),
                    None,
                ),
                ReadStrategy::Cached => {
                    let cache = Self::open_cache(&config)?;
                    let coalescer: ServiceReadCoalescer =
                        ReadCoalescer::new(Arc::clone(&cache), index, config.cache_config());
                    (Arc::new(coalescer), Some(cache))
                }
            };

        info!(
            read_strategy = %config.read_strategy,
            cache_backend = %config.cache_backend,
            index = %config.search_index,
            ttl_secs = config.page_cache_ttl.as_secs(),
            "Review service wired"
        );

        Ok(Self {
            usecase: Arc::new(ReviewUsecase::new(store, pages, ids)),
            cache,
            config,
        })
    }

    fn open_cache(config: &ServiceConfig) -> Result<Arc<dyn CacheLayer>, ConfigError> {
        match config.cache_backend {
            CacheBackendKind::Memory => Ok(Arc::new(InMemoryCache::new())),
            CacheBackendKind::Lmdb => {
                let path = config.lmdb_path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("lmdb cache backend needs a path".to_string())
                })?;
                let cache = LmdbCache::new(path, config.lmdb_max_size_mb)
                    .map_err(|e| ConfigError::CacheBackend(e.to_string()))?;
                Ok(Arc::new(cache))
            }
        }
    }

    /// A fresh context carrying the configured request deadline.
    pub fn request_context(&self) -> RequestContext {
        match self.config.request_timeout {
            Some(timeout) => RequestContext::with_timeout(timeout),
            None => RequestContext::background(),
        }
    }
}
