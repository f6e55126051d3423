//! Edge request router
//!
//! One call to [`EdgeRouter::handle`] per inbound request. The only state
//! shared between calls is the asset cache, the durable namespace, the
//! background write queue and the counters.

use crate::assets::{asset_key, AssetCache};
use crate::classify::{cache_key, forward_path, join_url, CacheRules, RouteKind, RouteTable};
use crate::config::{EdgeConfig, TtlConfig};
use crate::message::{EdgeRequest, EdgeResponse};
use crate::origin::{OriginClient, OriginRequest};
use crate::stats::{EdgeStats, StatsSnapshot};
use crate::writer::BackgroundWriter;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use fittrack_common::{KvStore, ObjectStore};
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Header marking a response served from the durable namespace
pub const FALLBACK_HEADER: &str = "x-edge-fallback";

/// External collaborators of the router
#[derive(Clone)]
pub struct EdgeBackends {
    /// Forwards to the tenant origin and the asset origin
    pub origin: Arc<dyn OriginClient>,
    /// Tenant's durable namespace
    pub kv: Arc<dyn KvStore>,
    /// Upload storage
    pub objects: Arc<dyn ObjectStore>,
}

/// Per-tenant request router
pub struct EdgeRouter {
    routes: RouteTable,
    cache_rules: CacheRules,
    backends: EdgeBackends,
    assets: AssetCache,
    writer: Arc<BackgroundWriter>,
    stats: Arc<EdgeStats>,
    backend_origin: RwLock<Option<String>>,
    default_origin: String,
    asset_origin: String,
    ttl: TtlConfig,
}

impl EdgeRouter {
    /// Build a router; spawns the write worker, so needs a tokio runtime
    pub fn new(config: &EdgeConfig, backends: EdgeBackends) -> Self {
        Self {
            routes: RouteTable::standard(),
            cache_rules: CacheRules::standard(),
            backends,
            assets: AssetCache::new(
                config.asset_cache_capacity,
                Duration::from_secs(config.ttl.asset_secs),
            ),
            writer: Arc::new(BackgroundWriter::new(config.write_queue_capacity)),
            stats: Arc::new(EdgeStats::default()),
            backend_origin: RwLock::new(config.backend_origin.clone()),
            default_origin: config.default_origin.clone(),
            asset_origin: config.asset_origin.clone(),
            ttl: config.ttl.clone(),
        }
    }

    /// Replace the tenant origin address
    pub fn set_origin(&self, origin: Option<String>) {
        tracing::info!(origin = ?origin, "Tenant origin changed");
        *self.backend_origin.write() = origin;
    }

    /// Origin set by config or a rebind, if any
    pub fn bound_origin(&self) -> Option<String> {
        self.backend_origin.read().clone()
    }

    /// Current forward base, falling back to the local default
    pub fn origin(&self) -> String {
        self.backend_origin
            .read()
            .clone()
            .unwrap_or_else(|| self.default_origin.clone())
    }

    /// Counter values
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Background write queue
    pub fn writer(&self) -> &BackgroundWriter {
        &self.writer
    }

    /// Route one request
    pub async fn handle(&self, req: EdgeRequest) -> EdgeResponse {
        let kind = self.routes.classify(&req.method, &req.path);
        tracing::debug!(method = %req.method, path = %req.path, route = ?kind, "Classified");

        match kind {
            RouteKind::Health => EdgeResponse::json(
                StatusCode::OK,
                &json!({ "status": "ok", "worker": "fittrack-pro" }),
            ),
            RouteKind::Upload => self.handle_upload(&req.path).await,
            RouteKind::StaticAsset => self.handle_static(req).await,
            RouteKind::Dynamic => self.handle_dynamic(req).await,
            RouteKind::Unmatched => {
                EdgeStats::bump(&self.stats.not_found);
                EdgeResponse::text(StatusCode::NOT_FOUND, "Not found")
            }
        }
    }

    async fn handle_static(&self, req: EdgeRequest) -> EdgeResponse {
        let url = join_url(&self.asset_origin, &req.path, req.query.as_deref());

        // Partial content is passed through and never touches the shared copy
        if req.headers.contains_key(header::RANGE) {
            let fetch = OriginRequest { method: Method::GET, url, headers: req.headers, body: None };
            return match self.backends.origin.fetch(fetch).await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!(path = %req.path, "Ranged asset fetch failed: {}", e);
                    EdgeStats::bump(&self.stats.unavailable);
                    unavailable()
                }
            };
        }

        let key = asset_key(&req.path, req.query.as_deref());
        if let Some(cached) = self.assets.get(&key).await {
            EdgeStats::bump(&self.stats.asset_hits);
            return cached;
        }
        EdgeStats::bump(&self.stats.asset_misses);

        let fetch = OriginRequest {
            method: Method::GET,
            url,
            headers: fill_headers(req.headers),
            body: None,
        };
        let mut resp = match self.backends.origin.fetch(fetch).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(path = %req.path, "Asset fetch failed: {}", e);
                EdgeStats::bump(&self.stats.unavailable);
                return unavailable();
            }
        };

        if resp.status == StatusCode::OK {
            resp.headers
                .insert(header::CACHE_CONTROL, cache_directive(self.ttl.asset_secs));
            let assets = self.assets.clone();
            let copy = resp.clone();
            self.enqueue("asset_cache", async move {
                assets.insert(key, copy).await;
            });
        }
        resp
    }

    async fn handle_dynamic(&self, req: EdgeRequest) -> EdgeResponse {
        let eligible = self.cache_rules.is_eligible(&req.method, &req.path);
        let key = cache_key(&req.path);
        let target = join_url(&self.origin(), &forward_path(&req.path), req.query.as_deref());
        let body = (req.method != Method::GET).then_some(req.body);

        let forward = OriginRequest {
            method: req.method,
            url: target,
            headers: req.headers,
            body,
        };

        match self.backends.origin.fetch(forward).await {
            Ok(mut resp) => {
                EdgeStats::bump(&self.stats.origin_ok);
                if eligible && resp.status.is_success() {
                    let kv = self.backends.kv.clone();
                    let value = resp.body.clone();
                    let ttl = Duration::from_secs(self.ttl.kv_secs);
                    let stats = self.stats.clone();
                    self.enqueue("kv_put", async move {
                        match kv.put(&key, value, ttl).await {
                            Ok(()) => EdgeStats::bump(&stats.kv_writes),
                            Err(e) => tracing::warn!(key = %key, "Cache write failed: {}", e),
                        }
                    });
                    resp.headers
                        .insert(header::CACHE_CONTROL, cache_directive(self.ttl.api_max_age_secs));
                }
                resp
            }
            Err(e) => {
                EdgeStats::bump(&self.stats.origin_failures);
                tracing::warn!(path = %req.path, eligible, "Origin forward failed: {}", e);
                if eligible {
                    if let Some(resp) = self.stale(&key).await {
                        return resp;
                    }
                }
                EdgeStats::bump(&self.stats.unavailable);
                unavailable()
            }
        }
    }

    async fn stale(&self, key: &str) -> Option<EdgeResponse> {
        match self.backends.kv.get(key).await {
            Ok(Some(body)) => {
                EdgeStats::bump(&self.stats.stale_served);
                tracing::info!(key = %key, "Serving stale fallback");
                Some(
                    EdgeResponse::new(StatusCode::OK, body)
                        .with_header(header::CONTENT_TYPE, "application/json")
                        .with_header(HeaderName::from_static(FALLBACK_HEADER), "true"),
                )
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, "Cache read failed: {}", e);
                None
            }
        }
    }

    async fn handle_upload(&self, path: &str) -> EdgeResponse {
        let key = path.strip_prefix("/uploads/").unwrap_or(path);
        match self.backends.objects.get(key).await {
            Ok(Some(object)) => {
                let content_type = object
                    .content_type
                    .as_deref()
                    .and_then(|ct| HeaderValue::from_str(ct).ok())
                    .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
                let mut resp = EdgeResponse::new(StatusCode::OK, object.body);
                resp.headers.insert(header::CONTENT_TYPE, content_type);
                resp.headers
                    .insert(header::CACHE_CONTROL, cache_directive(self.ttl.upload_max_age_secs));
                resp
            }
            Ok(None) => EdgeResponse::text(StatusCode::NOT_FOUND, "File not found"),
            Err(e) => {
                tracing::warn!(key = %key, "Object read failed: {}", e);
                EdgeStats::bump(&self.stats.unavailable);
                unavailable()
            }
        }
    }

    fn enqueue<F>(&self, name: &'static str, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if !self.writer.submit(name, task) {
            EdgeStats::bump(&self.stats.dropped_writes);
        }
    }
}

fn unavailable() -> EdgeResponse {
    EdgeResponse::text(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
}

/// Headers for a cache fill: the stored copy must be the full, unconditional body
fn fill_headers(mut headers: HeaderMap) -> HeaderMap {
    for name in [
        header::RANGE,
        header::IF_RANGE,
        header::IF_MATCH,
        header::IF_NONE_MATCH,
        header::IF_MODIFIED_SINCE,
        header::IF_UNMODIFIED_SINCE,
    ] {
        headers.remove(name);
    }
    headers
}

fn cache_directive(max_age: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={}", max_age))
        .unwrap_or_else(|_| HeaderValue::from_static("no-store"))
}
