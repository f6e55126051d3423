//! Offline cache configuration

use serde::{Deserialize, Serialize};
use url::Url;

/// Partition names and fixed rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// The client's own origin; only same-origin requests are cached
    pub origin: Url,
    /// App shell partition
    pub app_cache: String,
    /// Static asset partition
    pub asset_cache: String,
    /// API response partition
    pub api_cache: String,
    /// Entry points pre-fetched at install
    pub app_shell: Vec<String>,
    /// Document served to navigations while offline
    pub offline_document: String,
}

impl OfflineConfig {
    /// Current partition set for `origin`
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            app_cache: "fittrack-app-v1".into(),
            asset_cache: "fittrack-assets-v1".into(),
            api_cache: "fittrack-api-v1".into(),
            app_shell: vec!["/".into(), "/index.html".into()],
            offline_document: "/index.html".into(),
        }
    }

    /// Partitions kept on activate
    pub fn known_partitions(&self) -> [&str; 3] {
        [self.app_cache.as_str(), self.asset_cache.as_str(), self.api_cache.as_str()]
    }
}
