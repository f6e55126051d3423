//! Install/activate lifecycle and per-request strategies

use crate::config::OfflineConfig;
use crate::network::{ClientRequest, ClientResponse, Network, RequestMode};
use crate::storage::CacheStorage;
use crate::OfflineError;
use regex::Regex;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::sync::Arc;

const STATIC_EXTENSIONS: &str = r"\.(?:js|css|png|jpg|jpeg|gif|svg|webp|ico|woff2?|ttf|mp4|webm)$";
const API_PATTERNS: &[&str] = &[r"/clients/\d+/(?:profile|measurements|meals)", r"/trainers/dashboard"];

/// Result of offering a request to the offline cache
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not ours; the client does a normal network fetch
    Unhandled,
    /// Answer with this response
    Respond(ClientResponse),
    /// Answer with a network error
    NetworkError,
}

/// Which strategy a request gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Navigation,
    CacheFirst,
    NetworkFirst,
    PassThrough,
}

/// Client offline cache
pub struct OfflineCache {
    config: OfflineConfig,
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    static_assets: Regex,
    api_reads: Vec<Regex>,
}

impl OfflineCache {
    /// Build over existing storage
    pub fn new(config: OfflineConfig, storage: Arc<CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            storage,
            network,
            static_assets: compile(STATIC_EXTENSIONS),
            api_reads: API_PATTERNS.iter().map(|p| compile(p)).collect(),
        }
    }

    /// Storage behind this cache
    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// Pre-fetch the app shell. All-or-nothing: nothing is stored unless
    /// every entry point answered with a success.
    pub async fn install(&self) -> Result<(), OfflineError> {
        let mut fetched = Vec::with_capacity(self.config.app_shell.len());
        for path in &self.config.app_shell {
            let url = self.config.origin.join(path)?;
            let resp = self.network.fetch(&ClientRequest::get(url.clone())).await?;
            if !resp.is_ok() {
                return Err(OfflineError::BadStatus { url: url.into(), status: resp.status.as_u16() });
            }
            fetched.push((url, resp));
        }

        let app = self.storage.open(&self.config.app_cache);
        for (url, resp) in fetched {
            app.put(&url, resp);
        }
        tracing::info!(partition = %self.config.app_cache, entries = app.len(), "App shell installed");
        Ok(())
    }

    /// Drop every partition not in the current set; returns what was dropped
    pub fn activate(&self) -> Vec<String> {
        let known = self.config.known_partitions();
        let stale: Vec<String> = self
            .storage
            .keys()
            .into_iter()
            .filter(|name| !known.contains(&name.as_str()))
            .collect();

        for name in &stale {
            self.storage.delete(name);
            tracing::info!(partition = %name, "Dropped stale cache partition");
        }
        stale
    }

    /// Handle one client request
    pub async fn handle(&self, req: &ClientRequest) -> FetchOutcome {
        match self.strategy(req) {
            Strategy::Navigation => self.navigation(req).await,
            Strategy::CacheFirst => self.cache_first(req).await,
            Strategy::NetworkFirst => self.network_first(req).await,
            Strategy::PassThrough => FetchOutcome::Unhandled,
        }
    }

    fn strategy(&self, req: &ClientRequest) -> Strategy {
        if req.mode == RequestMode::Navigate {
            return Strategy::Navigation;
        }

        // Only GETs are stored; everything else goes straight to the network
        let same_origin = req.url.origin() == self.config.origin.origin();
        if !same_origin || req.method != Method::GET {
            return Strategy::PassThrough;
        }

        let path = req.url.path();
        if self.static_assets.is_match(path) {
            Strategy::CacheFirst
        } else if path.starts_with("/api/")
            && self.api_reads.iter().any(|re| re.is_match(path))
        {
            Strategy::NetworkFirst
        } else {
            Strategy::PassThrough
        }
    }

    async fn navigation(&self, req: &ClientRequest) -> FetchOutcome {
        match self.network.fetch(req).await {
            Ok(resp) => FetchOutcome::Respond(resp),
            Err(e) => {
                tracing::debug!(url = %req.url, "Navigation offline: {}", e);
                let cached = self
                    .config
                    .origin
                    .join(&self.config.offline_document)
                    .ok()
                    .and_then(|doc| self.storage.match_any(&doc));
                match cached {
                    Some(resp) => FetchOutcome::Respond(resp),
                    None => FetchOutcome::NetworkError,
                }
            }
        }
    }

    async fn cache_first(&self, req: &ClientRequest) -> FetchOutcome {
        let assets = self.storage.open(&self.config.asset_cache);
        if let Some(cached) = assets.get(&req.url) {
            return FetchOutcome::Respond(cached);
        }

        match self.network.fetch(req).await {
            Ok(resp) => {
                if resp.is_ok() {
                    assets.put(&req.url, resp.clone());
                }
                FetchOutcome::Respond(resp)
            }
            Err(e) => {
                tracing::debug!(url = %req.url, "Asset fetch failed: {}", e);
                // Another writer may have filled the entry meanwhile
                match assets.get(&req.url) {
                    Some(cached) => FetchOutcome::Respond(cached),
                    None => FetchOutcome::NetworkError,
                }
            }
        }
    }

    async fn network_first(&self, req: &ClientRequest) -> FetchOutcome {
        let api = self.storage.open(&self.config.api_cache);
        match self.network.fetch(req).await {
            Ok(resp) => {
                if resp.is_ok() {
                    api.put(&req.url, resp.clone());
                }
                FetchOutcome::Respond(resp)
            }
            Err(e) => {
                tracing::debug!(url = %req.url, "API fetch failed, trying cache: {}", e);
                FetchOutcome::Respond(api.get(&req.url).unwrap_or_else(offline_response))
            }
        }
    }
}

/// Fixed 503 JSON body for API reads with nothing cached
pub fn offline_response() -> ClientResponse {
    let body = serde_json::json!({ "error": "offline", "message": "Showing no cached data" });
    let mut resp = ClientResponse::new(StatusCode::SERVICE_UNAVAILABLE, body.to_string());
    resp.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

// Patterns are constants exercised by the tests below
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid offline pattern {pattern}: {e}"))
}
