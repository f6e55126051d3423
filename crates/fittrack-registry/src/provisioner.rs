//! Tenant Provisioner
//!
//! Registration and origin rebinding. Secrets are checked before anything
//! else, then required fields, then the resource-name guard. Cloud calls
//! happen only after all three pass.

use crate::cloud::CloudApi;
use crate::config::RegistryConfig;
use crate::model::{Tenant, TenantSummary, TenantView};
use crate::naming::{namespace_title, public_url, resource_name};
use crate::saga::{SagaDefinition, SagaExecution, SagaOrchestrator, TenantProvisioningSaga};
use crate::store::{TenantStore, TenantStoreError};
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashSet;
use fittrack_common::ApiError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

const HISTORY_LIMIT: usize = 64;
const UPDATE_ATTEMPTS: usize = 3;

/// `POST /register` body
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct RegisterRequest {
    pub trainer_name: Option<String>,
    pub trainer_email: Option<String>,
    pub trainer_phone: Option<String>,
    pub registration_secret: Option<String>,
}

/// Successful registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Registration {
    pub success: bool,
    pub trainer_id: String,
    pub worker_url: String,
    pub kv_namespace_id: String,
    pub message: String,
}

/// `POST /update-tunnel` body
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct UpdateTunnelRequest {
    pub trainer_id: Option<String>,
    pub tunnel_url: Option<String>,
    pub registration_secret: Option<String>,
}

/// Successful origin rebind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TunnelUpdate {
    pub success: bool,
    pub message: String,
    pub worker_url: String,
}

/// Naming and access settings
#[derive(Debug, Clone)]
pub struct ProvisionerSettings {
    /// Shared secret every mutating call must present
    pub registration_secret: String,
    /// Prepended to the slug to form the worker name
    pub worker_prefix: String,
    /// Domain the public URL lives under
    pub workers_domain: String,
    /// Binding name the edge reads its namespace from
    pub kv_binding: String,
}

impl From<&RegistryConfig> for ProvisionerSettings {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            registration_secret: config.registration_secret.clone(),
            worker_prefix: config.worker_prefix.clone(),
            workers_domain: config.workers_domain.clone(),
            kv_binding: config.kv_binding.clone(),
        }
    }
}

/// Tenant provisioner
pub struct Provisioner {
    settings: ProvisionerSettings,
    cloud: Arc<dyn CloudApi>,
    store: Arc<dyn TenantStore>,
    script: Bytes,
    in_flight: DashSet<String>,
    history: Mutex<VecDeque<SagaExecution>>,
}

impl Provisioner {
    /// Provisioner deploying `script` as each tenant's compute unit
    pub fn new(
        settings: ProvisionerSettings,
        cloud: Arc<dyn CloudApi>,
        store: Arc<dyn TenantStore>,
        script: Bytes,
    ) -> Self {
        Self {
            settings,
            cloud,
            store,
            script,
            in_flight: DashSet::new(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Provision resources for a new tenant and store its record
    pub async fn register(&self, req: RegisterRequest) -> Result<Registration, ApiError> {
        self.check_secret(req.registration_secret.as_deref())?;

        let (Some(name), Some(email)) = (non_empty(req.trainer_name), non_empty(req.trainer_email)) else {
            return Err(ApiError::InvalidInput("trainer_name and trainer_email required".into()));
        };
        let worker_name = resource_name(&self.settings.worker_prefix, &name).ok_or_else(|| {
            ApiError::InvalidInput("trainer_name must contain letters or digits".into())
        })?;

        let _reservation = self.reserve(&worker_name).await?;

        let trainer_id = Uuid::new_v4().to_string();
        tracing::info!(trainer = %name, id = %trainer_id, worker = %worker_name, "Registering trainer");

        let saga = TenantProvisioningSaga::new(self.cloud.clone(), self.script.clone(), &self.settings.kv_binding);
        let mut execution = SagaExecution::new(
            saga.saga_type(),
            TenantProvisioningSaga::input(&worker_name, &namespace_title(&worker_name)),
        );
        let outcome = SagaOrchestrator::new().execute(&saga, &mut execution).await;
        let resources = outcome.and_then(|()| TenantProvisioningSaga::resources(&execution));
        self.record(execution);

        let resources = resources.map_err(|e| {
            tracing::error!(worker = %worker_name, "Registration failed: {}", e);
            ApiError::UpstreamFailure { message: "Registration failed".into(), details: e.details() }
        })?;

        let worker_url = public_url(&resources.resource_name, &self.settings.workers_domain);
        let tenant = Tenant {
            id: trainer_id.clone(),
            name,
            email,
            phone: non_empty(req.trainer_phone),
            worker_name: resources.resource_name,
            worker_url: worker_url.clone(),
            kv_namespace_id: resources.namespace_id.clone(),
            tunnel_url: None,
            created_at: Utc::now(),
            last_tunnel_update: None,
            onboarded: false,
            version: 0,
        };
        self.store.insert(tenant).await.map_err(store_error)?;
        tracing::info!(id = %trainer_id, url = %worker_url, "Trainer registered");

        Ok(Registration {
            success: true,
            trainer_id,
            worker_url,
            kv_namespace_id: resources.namespace_id,
            message: "Trainer registered and Worker deployed successfully".into(),
        })
    }

    /// Point a tenant's compute unit at a new origin address
    pub async fn rebind_origin(&self, req: UpdateTunnelRequest) -> Result<TunnelUpdate, ApiError> {
        self.check_secret(req.registration_secret.as_deref())?;

        let (Some(trainer_id), Some(tunnel_url)) = (non_empty(req.trainer_id), non_empty(req.tunnel_url)) else {
            return Err(ApiError::InvalidInput("trainer_id and tunnel_url required".into()));
        };
        let tenant = self
            .store
            .get(&trainer_id)
            .await
            .ok_or_else(|| ApiError::NotFound("Trainer not found".into()))?;

        tracing::info!(trainer = %tenant.name, origin = %tunnel_url, "Updating tunnel");
        self.cloud
            .set_origin(&tenant.worker_name, &tunnel_url)
            .await
            .map_err(|e| {
                tracing::error!(id = %trainer_id, "Tunnel update failed: {}", e);
                ApiError::UpstreamFailure { message: "Tunnel update failed".into(), details: e.details() }
            })?;

        let updated = self.store_origin(tenant, &tunnel_url).await?;
        Ok(TunnelUpdate {
            success: true,
            message: "Tunnel URL updated".into(),
            worker_url: updated.worker_url,
        })
    }

    /// Tenant view by id
    pub async fn get_tenant(&self, id: &str) -> Result<TenantView, ApiError> {
        self.store
            .get(id)
            .await
            .map(|t| TenantView::from(&t))
            .ok_or_else(|| ApiError::NotFound("Trainer not found".into()))
    }

    /// All tenants, redacted
    pub async fn list_tenants(&self) -> Vec<TenantSummary> {
        self.store.list().await.iter().map(TenantSummary::from).collect()
    }

    /// Registered tenant count
    pub async fn count(&self) -> usize {
        self.store.count().await
    }

    /// Recent provisioning executions, oldest first
    pub fn executions(&self) -> Vec<SagaExecution> {
        self.history.lock().iter().cloned().collect()
    }

    fn check_secret(&self, given: Option<&str>) -> Result<(), ApiError> {
        let given = given.unwrap_or_default();
        if constant_time_compare(given.as_bytes(), self.settings.registration_secret.as_bytes()) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized("Invalid registration secret".into()))
        }
    }

    async fn reserve(&self, worker_name: &str) -> Result<Reservation<'_>, ApiError> {
        if !self.in_flight.insert(worker_name.to_string()) {
            return Err(duplicate(worker_name));
        }
        let reservation = Reservation { set: &self.in_flight, name: worker_name.to_string() };
        if self.store.find_by_resource_name(worker_name).await.is_some() {
            return Err(duplicate(worker_name));
        }
        Ok(reservation)
    }

    // Local write only; the remote update above is not repeated
    async fn store_origin(&self, mut tenant: Tenant, tunnel_url: &str) -> Result<Tenant, ApiError> {
        for _ in 0..UPDATE_ATTEMPTS {
            tenant.tunnel_url = Some(tunnel_url.to_string());
            tenant.last_tunnel_update = Some(Utc::now());
            tenant.onboarded = true;

            match self.store.update(tenant.clone()).await {
                Ok(updated) => return Ok(updated),
                Err(TenantStoreError::VersionConflict { .. }) => {
                    tenant = self
                        .store
                        .get(&tenant.id)
                        .await
                        .ok_or_else(|| ApiError::NotFound("Trainer not found".into()))?;
                }
                Err(e) => return Err(store_error(e)),
            }
        }
        Err(ApiError::Conflict("Trainer was modified concurrently".into()))
    }

    fn record(&self, execution: SagaExecution) {
        let mut history = self.history.lock();
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(execution);
    }
}

/// Releases a resource-name reservation on drop
struct Reservation<'a> {
    set: &'a DashSet<String>,
    name: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.name);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn duplicate(worker_name: &str) -> ApiError {
    tracing::warn!(worker = %worker_name, "Duplicate registration rejected");
    ApiError::Conflict(format!("Trainer name already registered as {}", worker_name))
}

fn store_error(e: TenantStoreError) -> ApiError {
    match e {
        TenantStoreError::NotFound(_) => ApiError::NotFound("Trainer not found".into()),
        other => ApiError::Conflict(other.to_string()),
    }
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
