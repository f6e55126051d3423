//! FitTrack Edge - Main Entry Point

use fittrack_common::telemetry::init_tracing;
use fittrack_common::{CloudflareClient, CloudflareKv, DirObjectStore, KvStore, MemoryKv};
use fittrack_edge::server::start_server;
use fittrack_edge::sync::spawn_origin_sync;
use fittrack_edge::{EdgeBackends, EdgeConfig, EdgeRouter, HttpOrigin, KvBackend, RegistryOrigin};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    tracing::info!("FitTrack Edge v{}", env!("CARGO_PKG_VERSION"));

    let config = EdgeConfig::from_env()?;
    tracing::info!(
        tenant = %config.tenant_id,
        origin = config.backend_origin.as_deref().unwrap_or(&config.default_origin),
        binding = %config.kv_binding,
        "Configuration loaded"
    );

    let kv: Arc<dyn KvStore> = match &config.kv {
        KvBackend::Memory => {
            tracing::warn!("Using in-memory namespace; cached data is lost on restart");
            Arc::new(MemoryKv::new())
        }
        KvBackend::Cloudflare { api_base, account_id, api_token, namespace_id } => {
            let client = CloudflareClient::new(api_base, account_id, api_token, config.origin_timeout())?;
            Arc::new(CloudflareKv::new(client, namespace_id.clone()))
        }
    };

    let backends = EdgeBackends {
        origin: Arc::new(HttpOrigin::new(config.origin_timeout())?),
        kv,
        objects: Arc::new(DirObjectStore::new(&config.uploads_dir)),
    };
    let edge = Arc::new(EdgeRouter::new(&config, backends));

    let sync = match config.origin_sync_target() {
        Some((registry, tenant)) => {
            let source = RegistryOrigin::new(registry, tenant, config.origin_timeout())?;
            Some(spawn_origin_sync(
                edge.clone(),
                Arc::new(source),
                Duration::from_secs(config.origin_sync_secs.max(1)),
            ))
        }
        None => {
            tracing::warn!("No registry configured; origin rebinds need a restart");
            None
        }
    };

    start_server(&config.listen_addr, edge).await?;

    if let Some(task) = sync {
        task.abort();
    }

    Ok(())
}
