use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A raw upstream body together with the time it was fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(body: String, fetched_at: DateTime<Utc>) -> Self {
        Self { body, fetched_at }
    }

    /// Entries may be reused while `now - fetched_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.fetched_at) < ttl
    }
}

/// Storage backend for cached upstream responses
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Look up the entry stored for a URL
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store or replace the entry for a URL
    async fn set(&self, key: &str, entry: CacheEntry);

    /// Drop the entry for a URL
    async fn remove(&self, key: &str);

    /// Number of stored entries, fresh or not
    async fn len(&self) -> usize;
}

/// In-memory implementation of the cache store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    async fn set(&self, key: &str, entry: CacheEntry) {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
    }

    async fn remove(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
