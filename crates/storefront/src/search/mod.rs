//! Read-through cache for the popular-terms aggregate.
//!
//! Backed by `moka` with a time-to-live: an entry older than the TTL is
//! treated as absent and recomputed. Concurrent lookups for the same key
//! coalesce onto a single recomputation (moka resolves one init future per
//! vacant key), so a cache miss under load cannot fan out into a
//! recomputation storm.
//!
//! Distinct-key cardinality is bounded by `max_capacity`; parameters here
//! are small integers, but the bound keeps an attacker-shaped key space
//! from growing the map without limit.

use std::sync::Arc;

use moka::future::Cache;

use bramble_core::RepositoryError;

use crate::config::PopularCacheConfig;
use crate::db::search::PopularTerm;

/// Cache key for aggregate queries.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    PopularTerms { limit: i64 },
}

/// A cache lookup result, marked hit or miss for observability.
#[derive(Debug, Clone)]
pub struct CacheLookup<T> {
    pub value: T,
    pub hit: bool,
}

/// Time-boxed memoization of the popular-terms aggregate.
#[derive(Clone)]
pub struct PopularTermsCache {
    cache: Cache<CacheKey, Arc<Vec<PopularTerm>>>,
}

impl PopularTermsCache {
    #[must_use]
    pub fn new(config: PopularCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    /// Return the cached aggregate for `key`, computing it with `init` on
    /// a miss. The returned lookup is marked `hit = true` only when the
    /// value was already fresh in the cache.
    ///
    /// # Errors
    ///
    /// Propagates the `init` failure; nothing is cached in that case.
    pub async fn get_or_compute<Fut>(
        &self,
        key: CacheKey,
        init: Fut,
    ) -> Result<CacheLookup<Arc<Vec<PopularTerm>>>, Arc<RepositoryError>>
    where
        Fut: Future<Output = Result<Vec<PopularTerm>, RepositoryError>> + Send,
    {
        let entry = self
            .cache
            .entry(key)
            .or_try_insert_with(async move { init.await.map(Arc::new) })
            .await?;

        let hit = !entry.is_fresh();
        Ok(CacheLookup {
            value: entry.into_value(),
            hit,
        })
    }

    /// Number of live entries (for observability).
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
