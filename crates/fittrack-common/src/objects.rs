//! Object stores for uploaded media

use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Stored object with its content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Raw payload
    pub body: Bytes,
    /// Stored content type, if known
    pub content_type: Option<String>,
}

/// Read-only object lookup
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object by key; `None` if absent
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError>;
}

/// In-process object store
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object
    pub fn put(&self, key: &str, body: impl Into<Bytes>, content_type: Option<&str>) {
        self.objects.insert(
            key.to_string(),
            StoredObject { body: body.into(), content_type: content_type.map(String::from) },
        );
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        Ok(self.objects.get(key).map(|o| o.clone()))
    }
}

/// Objects stored as files under a root directory.
///
/// Files are read whole into memory; uploads are photos and short clips.
#[derive(Debug, Clone)]
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    /// Serve objects from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key inside the root; keys escaping it resolve to nothing
    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !clean {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for DirObjectStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let Some(path) = self.resolve(key) else {
            return Ok(None);
        };

        // Directories and other non-files are absent objects, not failures
        match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => return Ok(None),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(StoredObject {
                body: Bytes::from(body),
                content_type: content_type_for(key).map(String::from),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Content type implied by a key's extension
pub fn content_type_for(key: &str) -> Option<&'static str> {
    let ext = key.rsplit_once('.')?.1.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(ct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryObjectStore::new();
        store.put("avatars/1.png", b"png".to_vec(), Some("image/png"));

        let obj = store.get("avatars/1.png").await.unwrap().unwrap();
        assert_eq!(obj.content_type.as_deref(), Some("image/png"));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dir_store_reads_files() {
        let root = std::env::temp_dir().join(format!("fittrack-objects-{}", std::process::id()));
        tokio::fs::create_dir_all(root.join("videos")).await.unwrap();
        tokio::fs::write(root.join("videos/squat.mp4"), b"mp4").await.unwrap();

        let store = DirObjectStore::new(&root);
        let obj = store.get("videos/squat.mp4").await.unwrap().unwrap();
        assert_eq!(obj.body, Bytes::from_static(b"mp4"));
        assert_eq!(obj.content_type.as_deref(), Some("video/mp4"));
        assert!(store.get("videos/none.mp4").await.unwrap().is_none());
        assert!(store.get("videos").await.unwrap().is_none());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_dir_store_rejects_traversal() {
        let store = DirObjectStore::new("/tmp");
        assert!(store.get("../etc/passwd").await.unwrap().is_none());
        assert!(store.get("/etc/passwd").await.unwrap().is_none());
        assert!(store.get("").await.unwrap().is_none());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a/b.JPG"), Some("image/jpeg"));
        assert_eq!(content_type_for("noext"), None);
        assert_eq!(content_type_for("x.bin"), None);
    }
}
