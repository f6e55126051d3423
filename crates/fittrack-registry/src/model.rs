//! Tenant records and their external views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered trainer and the resources provisioned for them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique, immutable id
    pub id: String,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Resource name, derived from `name` once at creation
    pub worker_name: String,
    /// Public base URL
    pub worker_url: String,
    /// Durable namespace id; never exposed externally
    pub kv_namespace_id: String,
    /// Current origin address
    pub tunnel_url: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last origin rebind
    pub last_tunnel_update: Option<DateTime<Utc>>,
    /// Set once an origin has been bound
    pub onboarded: bool,
    /// Bumped on every store update
    pub version: u64,
}

/// Everything about a tenant except the namespace id
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub worker_name: String,
    pub worker_url: String,
    pub tunnel_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_tunnel_update: Option<DateTime<Utc>>,
    pub onboarded: bool,
}

/// Row of the tenant list
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub worker_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Tenant> for TenantView {
    fn from(t: &Tenant) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            email: t.email.clone(),
            phone: t.phone.clone(),
            worker_name: t.worker_name.clone(),
            worker_url: t.worker_url.clone(),
            tunnel_url: t.tunnel_url.clone(),
            created_at: t.created_at,
            last_tunnel_update: t.last_tunnel_update,
            onboarded: t.onboarded,
        }
    }
}

impl From<&Tenant> for TenantSummary {
    fn from(t: &Tenant) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            email: t.email.clone(),
            worker_url: t.worker_url.clone(),
            created_at: t.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_hides_namespace() {
        let tenant = Tenant {
            id: "t-1".into(),
            name: "Jane Doe".into(),
            email: "jane@x.com".into(),
            phone: None,
            worker_name: "fittrackjanedoe".into(),
            worker_url: "https://fittrackjanedoe.workers.dev".into(),
            kv_namespace_id: "ns-secret".into(),
            tunnel_url: None,
            created_at: Utc::now(),
            last_tunnel_update: None,
            onboarded: false,
            version: 1,
        };

        let json = serde_json::to_value(TenantView::from(&tenant)).unwrap();
        assert!(json.get("kv_namespace_id").is_none());
        assert!(json.get("version").is_none());
        assert_eq!(json["worker_name"], "fittrackjanedoe");
        assert!(!json.to_string().contains("ns-secret"));
    }
}
