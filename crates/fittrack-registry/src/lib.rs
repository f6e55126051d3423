//! FitTrack Tenant Registry
//!
//! Control plane that onboards trainers. Registration provisions an
//! isolated set of edge resources per tenant as a saga; origin rebinding
//! points the tenant's edge at a new backend address.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          TENANT REGISTRY                             │
//! │                                                                      │
//! │   HTTP API ──► Provisioner ──┬──► ProvisioningSaga ──► CloudApi      │
//! │                              │      1. create_namespace              │
//! │                              │      2. deploy_compute_unit           │
//! │                              │      3. bind_namespace                │
//! │                              │      4. enable_subdomain (best effort)│
//! │                              │      compensations run in reverse     │
//! │                              │                                       │
//! │                              └──► TenantStore (versioned records)    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod cloud;
pub mod config;
pub mod model;
pub mod naming;
pub mod provisioner;
pub mod saga;
pub mod store;

pub use cloud::CloudApi;
pub use config::RegistryConfig;
pub use model::{Tenant, TenantSummary, TenantView};
pub use provisioner::{Provisioner, Registration, RegisterRequest, UpdateTunnelRequest};
pub use saga::{SagaExecution, SagaStatus, StepStatus};
pub use store::{MemoryTenantStore, TenantStore, TenantStoreError};
