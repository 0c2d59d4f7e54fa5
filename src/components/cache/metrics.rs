use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Prefix of every exported metric name
pub const METRIC_PREFIX: &str = "merkliste_";

/// Prometheus instruments of one cache, labelled `cache="<name>"`
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    pub(super) size: IntGauge,
    pub(super) insertions: IntCounter,
    pub(super) hits: IntCounter,
    pub(super) misses: IntCounter,
    pub(super) evictions: IntCounter,
}

impl CacheMetrics {
    pub fn new(cache: &str) -> prometheus::Result<Self> {
        let opts = |name: &str, help: &str| {
            Opts::new(format!("{}cache_{}", METRIC_PREFIX, name), help).const_label("cache", cache)
        };
        Ok(Self {
            size: IntGauge::with_opts(opts("size", "Current size of the cache"))?,
            insertions: IntCounter::with_opts(opts("insertions", "Number of insertions into the cache"))?,
            hits: IntCounter::with_opts(opts("hits", "Number of cache hits"))?,
            misses: IntCounter::with_opts(opts("misses", "Number of cache misses"))?,
            evictions: IntCounter::with_opts(opts("evictions", "Number of cache evictions"))?,
        })
    }

    /// Add all instruments to `registry`
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.size.clone()))?;
        registry.register(Box::new(self.insertions.clone()))?;
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        registry.register(Box::new(self.evictions.clone()))?;
        Ok(())
    }
}
