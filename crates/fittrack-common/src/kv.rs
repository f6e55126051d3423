//! Key/value cache stores
//!
//! The durable per-tenant namespace behind the edge's stale fallback. Values
//! are opaque bytes; the TTL is fixed at write time and a later write to the
//! same key replaces both value and TTL. Nothing here evicts proactively.

use crate::cloudflare::CloudflareClient;
use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key/value store with write-time TTL
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value; `None` when missing or expired
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Write a value, replacing any previous one
    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a value
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct KvEntry {
    value: Bytes,
    expires_at: Instant,
}

/// In-process store; expiry is checked when an entry is read
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    entries: Arc<DashMap<String, KvEntry>>,
}

impl MemoryKv {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|e| (e.value.clone(), e.expires_at > now));

        match hit {
            Some((value, true)) => Ok(Some(value)),
            Some((_, false)) => {
                self.entries.remove_if(key, |_, e| e.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let entry = KvEntry { value, expires_at: Instant::now() + ttl };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A tenant's provisioned Cloudflare KV namespace; TTL enforced by the store
#[derive(Clone)]
pub struct CloudflareKv {
    client: CloudflareClient,
    namespace_id: String,
}

impl CloudflareKv {
    /// Bind to one namespace
    pub fn new(client: CloudflareClient, namespace_id: impl Into<String>) -> Self {
        Self { client, namespace_id: namespace_id.into() }
    }
}

#[async_trait]
impl KvStore for CloudflareKv {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.client
            .kv_get(&self.namespace_id, key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        self.client
            .kv_put(&self.namespace_id, key, value, ttl)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .kv_delete(&self.namespace_id, key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let kv = MemoryKv::new();
        kv.put("kv:a", Bytes::from_static(b"one"), Duration::from_secs(60)).await.unwrap();
        kv.put("kv:a", Bytes::from_static(b"two"), Duration::from_secs(60)).await.unwrap();

        assert_eq!(kv.get("kv:a").await.unwrap().unwrap(), Bytes::from_static(b"two"));
        assert_eq!(kv.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_dropped_on_read() {
        let kv = MemoryKv::new();
        kv.put("kv:short", Bytes::from_static(b"x"), Duration::from_millis(0)).await.unwrap();

        assert!(kv.get("kv:short").await.unwrap().is_none());
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let kv = MemoryKv::new();
        kv.put("kv:a", Bytes::from_static(b"x"), Duration::from_secs(60)).await.unwrap();
        kv.delete("kv:a").await.unwrap();
        assert!(kv.get("kv:a").await.unwrap().is_none());
    }
}
