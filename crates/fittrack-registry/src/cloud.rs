//! Cloud-resource operations used by provisioning

use async_trait::async_trait;
use bytes::Bytes;
use fittrack_common::{Binding, CloudflareClient, CloudflareError};

/// Env binding through which a compute unit learns its origin address
pub const ORIGIN_BINDING: &str = "BACKEND_ORIGIN";

/// Remote operations on per-tenant resources. Each is one network call,
/// not retried.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Create a durable namespace; returns its id
    async fn create_namespace(&self, title: &str) -> Result<String, CloudflareError>;
    /// Delete a durable namespace
    async fn delete_namespace(&self, namespace_id: &str) -> Result<(), CloudflareError>;
    /// Deploy (or replace) a compute unit
    async fn deploy_unit(&self, unit: &str, script: Bytes) -> Result<(), CloudflareError>;
    /// Delete a compute unit
    async fn delete_unit(&self, unit: &str) -> Result<(), CloudflareError>;
    /// Expose a namespace to a compute unit under `binding`
    async fn bind_namespace(&self, unit: &str, binding: &str, namespace_id: &str) -> Result<(), CloudflareError>;
    /// Remove every namespace binding from a compute unit
    async fn unbind_namespace(&self, unit: &str) -> Result<(), CloudflareError>;
    /// Make the compute unit reachable on its public subdomain
    async fn enable_subdomain(&self, unit: &str) -> Result<(), CloudflareError>;
    /// Point the compute unit at a new origin address
    async fn set_origin(&self, unit: &str, origin: &str) -> Result<(), CloudflareError>;
}

#[async_trait]
impl CloudApi for CloudflareClient {
    async fn create_namespace(&self, title: &str) -> Result<String, CloudflareError> {
        self.create_kv_namespace(title).await
    }

    async fn delete_namespace(&self, namespace_id: &str) -> Result<(), CloudflareError> {
        self.delete_kv_namespace(namespace_id).await
    }

    async fn deploy_unit(&self, unit: &str, script: Bytes) -> Result<(), CloudflareError> {
        self.upload_worker(unit, script).await
    }

    async fn delete_unit(&self, unit: &str) -> Result<(), CloudflareError> {
        self.delete_worker(unit).await
    }

    async fn bind_namespace(&self, unit: &str, binding: &str, namespace_id: &str) -> Result<(), CloudflareError> {
        let bindings = [Binding::KvNamespace {
            name: binding.to_string(),
            namespace_id: namespace_id.to_string(),
        }];
        self.put_bindings(unit, &bindings).await
    }

    async fn unbind_namespace(&self, unit: &str) -> Result<(), CloudflareError> {
        self.put_bindings(unit, &[]).await
    }

    async fn enable_subdomain(&self, unit: &str) -> Result<(), CloudflareError> {
        CloudflareClient::enable_subdomain(self, unit).await
    }

    async fn set_origin(&self, unit: &str, origin: &str) -> Result<(), CloudflareError> {
        let bindings = [Binding::PlainText {
            name: ORIGIN_BINDING.to_string(),
            text: origin.to_string(),
        }];
        self.put_settings(unit, &bindings).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::routing::put;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    async fn serve(seen: Seen) -> String {
        let record = |kind: &'static str| {
            let seen = seen.clone();
            move |Path((_acct, script)): Path<(String, String)>, Json(body): Json<serde_json::Value>| {
                let seen = seen.clone();
                async move {
                    seen.lock().push((format!("{} {}", kind, script), body));
                    Json(serde_json::json!({ "success": true, "errors": [], "result": null }))
                }
            }
        };
        let app = Router::new()
            .route("/accounts/:acct/workers/scripts/:script/bindings", put(record("bindings")))
            .route("/accounts/:acct/workers/scripts/:script/settings", put(record("settings")));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_binding_payloads() {
        let seen: Seen = Arc::default();
        let base = serve(seen.clone()).await;
        let client = CloudflareClient::new(&base, "acct", "tok", Duration::from_secs(5)).unwrap();

        client.bind_namespace("fittrackjane", "FITTRACK_KV", "ns-1").await.unwrap();
        client.set_origin("fittrackjane", "https://abc.trycloudflare.com").await.unwrap();

        let seen = seen.lock().clone();
        assert_eq!(seen[0].0, "bindings fittrackjane");
        assert_eq!(
            seen[0].1,
            serde_json::json!({ "bindings": [
                { "type": "kv_namespace", "name": "FITTRACK_KV", "namespace_id": "ns-1" }
            ]})
        );
        assert_eq!(seen[1].0, "settings fittrackjane");
        assert_eq!(
            seen[1].1,
            serde_json::json!({ "bindings": [
                { "type": "plain_text", "name": "BACKEND_ORIGIN", "text": "https://abc.trycloudflare.com" }
            ]})
        );
    }
}
