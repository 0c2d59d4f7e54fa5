//! Time-bounded memoization of upstream responses.
//!
//! Entries are keyed by the full sub-resource URL and expire a fixed TTL
//! after they were fetched. Expiry is checked lazily on read; there is no
//! background eviction. Failed fetches are never stored.

mod clock;
mod metrics;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use metrics::{CacheMetrics, METRIC_PREFIX};
pub use store::{CacheEntry, CacheStore, InMemoryStore};

use crate::error::{AppResult, GatewayResult};
use prometheus::Registry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Snapshot of the counters of one cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

/// Cache in front of an upstream fetch
#[derive(Clone)]
pub struct ResponseCache {
    name: &'static str,
    ttl: Duration,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    metrics: CacheMetrics,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ResponseCache {
    /// Create an in-memory cache on the system clock
    pub fn new(name: &'static str, ttl: Duration) -> AppResult<Self> {
        Self::with_backend(name, ttl, Arc::new(InMemoryStore::default()), Arc::new(SystemClock))
    }

    /// Create a cache with an explicit store and clock
    pub fn with_backend(
        name: &'static str,
        ttl: Duration,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        Ok(Self {
            name,
            ttl,
            store,
            clock,
            metrics: CacheMetrics::new(name)?,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Export this cache's metrics through `registry`
    pub fn register_metrics(&self, registry: &Registry) -> AppResult<()> {
        Ok(self.metrics.register(registry)?)
    }

    /// Return the cached body for `url`, or run `fetcher` and cache its result.
    ///
    /// Concurrent misses for the same URL may each run the fetcher; the last
    /// successful result wins.
    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetcher: F) -> GatewayResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<String>>,
    {
        if let Some(body) = self.lookup(url).await {
            return Ok(body);
        }
        let body = fetcher().await?;
        self.insert(url, body.clone()).await;
        Ok(body)
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but a fetched body is only
    /// cached when `parse` accepts it. Each body is parsed once.
    pub async fn get_or_fetch_parsed<T, F, Fut, P>(
        &self,
        url: &str,
        fetcher: F,
        parse: P,
    ) -> GatewayResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<String>>,
        P: FnOnce(&str) -> GatewayResult<T>,
    {
        if let Some(body) = self.lookup(url).await {
            return parse(&body);
        }
        let body = fetcher().await?;
        let value = parse(&body)?;
        self.insert(url, body).await;
        Ok(value)
    }

    /// Fresh body for `url`, dropping an expired entry on the way
    async fn lookup(&self, url: &str) -> Option<String> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);

        if let Some(entry) = self.store.get(url).await {
            if entry.is_fresh(self.clock.now(), ttl) {
                self.metrics.hits.inc();
                debug!(cache = self.name, url, "cache hit");
                return Some(entry.body);
            }
            self.store.remove(url).await;
            self.metrics.evictions.inc();
            self.metrics.size.set(self.store.len().await as i64);
            debug!(cache = self.name, url, "cache entry expired");
        }

        self.metrics.misses.inc();
        debug!(cache = self.name, url, "cache miss");
        None
    }

    async fn insert(&self, url: &str, body: String) {
        self.store
            .set(url, CacheEntry::new(body, self.clock.now()))
            .await;
        self.metrics.insertions.inc();
        self.metrics.size.set(self.store.len().await as i64);
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.metrics.hits.get(),
            misses: self.metrics.misses.get(),
            insertions: self.metrics.insertions.get(),
            evictions: self.metrics.evictions.get(),
        }
    }
}
