//! Origin rebind propagation
//!
//! The registry records every rebind on the tenant record. A running edge
//! polls `GET {registry}/trainer/{tenant}` and swaps its forward base when
//! `tunnel_url` changes, so a new tunnel reaches traffic without a restart.

use crate::origin::OriginError;
use crate::router::EdgeRouter;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Where the tenant's current origin address is published
#[async_trait]
pub trait OriginSource: Send + Sync {
    /// Current origin; `None` while the tenant has never been bound
    async fn current_origin(&self) -> Result<Option<String>, OriginError>;
}

#[derive(Debug, Deserialize)]
struct TenantOrigin {
    tunnel_url: Option<String>,
}

/// Reads the tenant record from the registry API
pub struct RegistryOrigin {
    client: reqwest::Client,
    url: String,
}

impl RegistryOrigin {
    /// Poll target for one tenant
    pub fn new(registry_url: &str, tenant_id: &str, timeout: Duration) -> Result<Self, OriginError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OriginError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/trainer/{}", registry_url.trim_end_matches('/'), tenant_id),
        })
    }
}

#[async_trait]
impl OriginSource for RegistryOrigin {
    async fn current_origin(&self) -> Result<Option<String>, OriginError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| OriginError::Unreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(OriginError::Unreachable(format!("registry answered {}", resp.status())));
        }
        let tenant: TenantOrigin = resp
            .json()
            .await
            .map_err(|e| OriginError::Unreachable(e.to_string()))?;
        Ok(tenant.tunnel_url.filter(|u| !u.is_empty()))
    }
}

/// Apply the published origin once; true when the router changed
pub async fn sync_once(router: &EdgeRouter, source: &dyn OriginSource) -> bool {
    match source.current_origin().await {
        Ok(Some(origin)) if router.bound_origin().as_deref() != Some(origin.as_str()) => {
            router.set_origin(Some(origin));
            true
        }
        Ok(_) => false,
        Err(e) => {
            // Keep forwarding to the last known origin
            tracing::warn!("Origin sync failed: {}", e);
            false
        }
    }
}

/// Poll `source` every `every` for the lifetime of the task
pub fn spawn_origin_sync(
    router: Arc<EdgeRouter>,
    source: Arc<dyn OriginSource>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(every = ?every, "Starting origin sync");
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            sync_once(&router, source.as_ref()).await;
        }
    })
}
