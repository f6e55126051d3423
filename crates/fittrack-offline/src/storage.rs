//! Named cache partitions

use crate::network::ClientResponse;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use url::Url;

/// One named partition, keyed by request URL
#[derive(Debug, Clone, Default)]
pub struct Partition {
    entries: Arc<DashMap<String, ClientResponse>>,
}

impl Partition {
    /// Stored response for `url`
    pub fn get(&self, url: &Url) -> Option<ClientResponse> {
        self.entries.get(&entry_key(url)).map(|e| e.clone())
    }

    /// Store or replace
    pub fn put(&self, url: &Url, resp: ClientResponse) {
        self.entries.insert(entry_key(url), resp);
    }

    /// Entry count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All partitions, in creation order
#[derive(Debug, Default)]
pub struct CacheStorage {
    partitions: RwLock<Vec<(String, Partition)>>,
}

impl CacheStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition by name, created if missing
    pub fn open(&self, name: &str) -> Partition {
        if let Some(p) = self.find(name) {
            return p;
        }
        let mut partitions = self.partitions.write();
        if let Some((_, p)) = partitions.iter().find(|(n, _)| n == name) {
            return p.clone();
        }
        let partition = Partition::default();
        partitions.push((name.to_string(), partition.clone()));
        partition
    }

    /// Existing partition by name
    pub fn find(&self, name: &str) -> Option<Partition> {
        self.partitions
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
    }

    /// Partition names
    pub fn keys(&self) -> Vec<String> {
        self.partitions.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Drop a partition; false if it did not exist
    pub fn delete(&self, name: &str) -> bool {
        let mut partitions = self.partitions.write();
        let before = partitions.len();
        partitions.retain(|(n, _)| n != name);
        partitions.len() != before
    }

    /// First match across partitions, oldest partition first
    pub fn match_any(&self, url: &Url) -> Option<ClientResponse> {
        self.partitions.read().iter().find_map(|(_, p)| p.get(url))
    }
}

fn entry_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}
