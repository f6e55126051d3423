//! FitTrack Registry - Main Entry Point

use bytes::Bytes;
use fittrack_common::telemetry::init_tracing;
use fittrack_common::CloudflareClient;
use fittrack_registry::api::start_server;
use fittrack_registry::provisioner::ProvisionerSettings;
use fittrack_registry::{MemoryTenantStore, Provisioner, RegistryConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    tracing::info!("FitTrack Registry v{}", env!("CARGO_PKG_VERSION"));

    let config = RegistryConfig::from_env()?;
    tracing::info!(account = %config.account_id, "Cloud account configured");

    let script = tokio::fs::read(&config.worker_script_path)
        .await
        .map_err(|e| format!("cannot read worker script {}: {}", config.worker_script_path, e))?;
    tracing::info!(path = %config.worker_script_path, bytes = script.len(), "Worker script loaded");

    let cloud = CloudflareClient::new(
        &config.api_base,
        &config.account_id,
        &config.api_token,
        config.request_timeout,
    )?;

    let provisioner = Provisioner::new(
        ProvisionerSettings::from(&config),
        Arc::new(cloud),
        Arc::new(MemoryTenantStore::new()),
        Bytes::from(script),
    );

    start_server(config.port, Arc::new(provisioner)).await?;

    Ok(())
}
