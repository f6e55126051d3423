//! Shared static asset cache

use crate::message::EdgeResponse;
use moka::future::Cache;
use std::time::Duration;

/// Edge copy of static assets, keyed by path and query
#[derive(Clone)]
pub struct AssetCache {
    cache: Cache<String, EdgeResponse>,
}

impl AssetCache {
    /// Bounded cache whose entries live for `ttl`
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Cached copy, if any
    pub async fn get(&self, key: &str) -> Option<EdgeResponse> {
        self.cache.get(key).await
    }

    /// Store a copy, replacing any previous one
    pub async fn insert(&self, key: String, resp: EdgeResponse) {
        self.cache.insert(key, resp).await;
    }

    /// Approximate entry count
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.cache.entry_count() == 0
    }
}

/// Cache key for an asset request
pub fn asset_key(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}?{}", path, q),
        _ => path.to_string(),
    }
}
