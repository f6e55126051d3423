//! Tenant persistence
//!
//! Records are versioned. `update` only succeeds against the version the
//! caller read, so concurrent writers cannot silently overwrite each other.

use crate::model::Tenant;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

/// Tenant store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantStoreError {
    /// No tenant with this id
    #[error("tenant {0} not found")]
    NotFound(String),
    /// Id or resource name already taken
    #[error("duplicate tenant: {0}")]
    Duplicate(String),
    /// Record changed since it was read
    #[error("version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict {
        /// Tenant id
        id: String,
        /// Version the caller read
        expected: u64,
        /// Version currently stored
        found: u64,
    },
}

/// Tenant record storage
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Tenant by id
    async fn get(&self, id: &str) -> Option<Tenant>;
    /// Tenant by resource name
    async fn find_by_resource_name(&self, resource_name: &str) -> Option<Tenant>;
    /// Add a new tenant at version 1
    async fn insert(&self, tenant: Tenant) -> Result<Tenant, TenantStoreError>;
    /// Replace a tenant read at `tenant.version`; stores and returns the next version
    async fn update(&self, tenant: Tenant) -> Result<Tenant, TenantStoreError>;
    /// All tenants, oldest first
    async fn list(&self) -> Vec<Tenant>;
    /// Tenant count
    async fn count(&self) -> usize;
}

/// In-memory tenant store
#[derive(Debug, Default)]
pub struct MemoryTenantStore {
    tenants: RwLock<HashMap<String, Tenant>>,
}

impl MemoryTenantStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn get(&self, id: &str) -> Option<Tenant> {
        self.tenants.read().get(id).cloned()
    }

    async fn find_by_resource_name(&self, resource_name: &str) -> Option<Tenant> {
        self.tenants
            .read()
            .values()
            .find(|t| t.worker_name == resource_name)
            .cloned()
    }

    async fn insert(&self, mut tenant: Tenant) -> Result<Tenant, TenantStoreError> {
        let mut tenants = self.tenants.write();
        if tenants.contains_key(&tenant.id) {
            return Err(TenantStoreError::Duplicate(tenant.id));
        }
        if tenants.values().any(|t| t.worker_name == tenant.worker_name) {
            return Err(TenantStoreError::Duplicate(tenant.worker_name));
        }
        tenant.version = 1;
        tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn update(&self, mut tenant: Tenant) -> Result<Tenant, TenantStoreError> {
        let mut tenants = self.tenants.write();
        let current = tenants
            .get_mut(&tenant.id)
            .ok_or_else(|| TenantStoreError::NotFound(tenant.id.clone()))?;

        if current.version != tenant.version {
            return Err(TenantStoreError::VersionConflict {
                id: tenant.id,
                expected: tenant.version,
                found: current.version,
            });
        }
        tenant.version += 1;
        *current = tenant.clone();
        Ok(tenant)
    }

    async fn list(&self) -> Vec<Tenant> {
        let mut all: Vec<Tenant> = self.tenants.read().values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    async fn count(&self) -> usize {
        self.tenants.read().len()
    }
}
