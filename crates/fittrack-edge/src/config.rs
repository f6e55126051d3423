//! Edge Configuration

use crate::EdgeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Env var naming the config file
pub const CONFIG_PATH_ENV: &str = "FITTRACK_EDGE_CONFIG";
/// Config file used when the env var is unset
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fittrack/edge.json";

/// Edge configuration, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listen address
    pub listen_addr: String,
    /// Tenant this edge serves
    pub tenant_id: String,
    /// Tenant origin address, usually a tunnel URL
    pub backend_origin: Option<String>,
    /// Origin used while `backend_origin` is unset
    pub default_origin: String,
    /// Where static assets are fetched from on a cache miss
    pub asset_origin: String,
    /// Name of the durable namespace binding
    pub kv_binding: String,
    /// Durable namespace backend
    pub kv: KvBackend,
    /// Directory served under `/uploads/`
    pub uploads_dir: String,
    /// TTL settings
    pub ttl: TtlConfig,
    /// Per-request origin timeout in seconds
    pub origin_timeout_secs: u64,
    /// Background write queue capacity
    pub write_queue_capacity: usize,
    /// Max static assets held at the edge
    pub asset_cache_capacity: u64,
    /// Registry polled for origin rebinds; unset disables polling
    pub registry_url: Option<String>,
    /// Seconds between origin polls
    pub origin_sync_secs: u64,
}

/// Durable namespace backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KvBackend {
    /// Process-local map; cached entries die with the process
    Memory,
    /// Tenant's provisioned Cloudflare KV namespace
    Cloudflare {
        /// API base URL
        #[serde(default = "default_api_base")]
        api_base: String,
        /// Account id
        account_id: String,
        /// API token
        api_token: String,
        /// Namespace id returned at registration
        namespace_id: String,
    },
}

fn default_api_base() -> String {
    fittrack_common::cloudflare::DEFAULT_API_BASE.to_string()
}

/// Cache lifetimes, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Durable namespace entry TTL
    pub kv_secs: u64,
    /// Edge asset copy TTL
    pub asset_secs: u64,
    /// `max-age` on cache-eligible API responses
    pub api_max_age_secs: u64,
    /// `max-age` on uploaded objects
    pub upload_max_age_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            kv_secs: 86_400,
            asset_secs: 86_400,
            api_max_age_secs: 300,
            upload_max_age_secs: 31_536_000,
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8787".into(),
            tenant_id: String::new(),
            backend_origin: None,
            default_origin: "http://localhost:8000".into(),
            asset_origin: "http://localhost:3000".into(),
            kv_binding: "FITTRACK_KV".into(),
            kv: KvBackend::Memory,
            uploads_dir: "./uploads".into(),
            ttl: TtlConfig::default(),
            origin_timeout_secs: 30,
            write_queue_capacity: 1024,
            asset_cache_capacity: 10_000,
            registry_url: None,
            origin_sync_secs: 30,
        }
    }
}

impl EdgeConfig {
    /// Load from file
    pub fn load(path: &str) -> Result<Self, EdgeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EdgeError::Config(format!("{}: {}", path, e)))?;
        serde_json::from_str(&content).map_err(|e| EdgeError::Config(format!("{}: {}", path, e)))
    }

    /// Load from `FITTRACK_EDGE_CONFIG`, defaulting when the file is missing,
    /// then apply environment overrides
    pub fn from_env() -> Result<Self, EdgeError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

        let mut config = if std::path::Path::new(&path).exists() {
            Self::load(&path)?
        } else {
            tracing::warn!(path = %path, "Config not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `BACKEND_ORIGIN`, `ASSET_ORIGIN`, `EDGE_LISTEN_ADDR` and
    /// `FITTRACK_REGISTRY_URL`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(origin) = lookup("BACKEND_ORIGIN").filter(|v| !v.is_empty()) {
            self.backend_origin = Some(origin);
        }
        if let Some(origin) = lookup("ASSET_ORIGIN").filter(|v| !v.is_empty()) {
            self.asset_origin = origin;
        }
        if let Some(addr) = lookup("EDGE_LISTEN_ADDR").filter(|v| !v.is_empty()) {
            self.listen_addr = addr;
        }
        if let Some(url) = lookup("FITTRACK_REGISTRY_URL").filter(|v| !v.is_empty()) {
            self.registry_url = Some(url);
        }
    }

    /// Per-request origin timeout
    pub fn origin_timeout(&self) -> Duration {
        Duration::from_secs(self.origin_timeout_secs)
    }

    /// Registry to poll for rebinds, when both it and the tenant are known
    pub fn origin_sync_target(&self) -> Option<(&str, &str)> {
        match (&self.registry_url, self.tenant_id.is_empty()) {
            (Some(url), false) => Some((url.as_str(), self.tenant_id.as_str())),
            _ => None,
        }
    }
}
