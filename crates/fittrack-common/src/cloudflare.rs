//! Cloudflare resource API client
//!
//! Thin wrapper over the account-scoped v4 REST API. Every call is a single
//! request with no retries; failures carry the upstream `errors` payload so
//! callers can surface it verbatim.

use bytes::Bytes;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default API base
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare API errors
#[derive(Error, Debug)]
pub enum CloudflareError {
    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// API answered with `success: false` or a non-2xx status
    #[error("cloudflare API error ({status}): {errors}")]
    Api {
        /// HTTP status returned
        status: u16,
        /// The `errors` array, or the raw body when it was not an envelope
        errors: serde_json::Value,
    },

    /// Response body did not match the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// Endpoint could not be built
    #[error("invalid endpoint: {0}")]
    InvalidUrl(String),
}

impl CloudflareError {
    /// Payload suitable for the `details` field of an error response
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::Api { errors, .. } => errors.clone(),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

/// Script binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Binding {
    /// KV namespace exposed to the script under `name`
    KvNamespace {
        /// Binding name
        name: String,
        /// Namespace id
        namespace_id: String,
    },
    /// Plain-text environment value
    PlainText {
        /// Binding name
        name: String,
        /// Value
        text: String,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: serde_json::Value,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct NamespaceResult {
    id: String,
}

/// Account-scoped API client
#[derive(Clone)]
pub struct CloudflareClient {
    http: reqwest::Client,
    api_base: String,
    account_id: String,
    api_token: String,
}

impl CloudflareClient {
    /// Create a client for one account
    pub fn new(api_base: &str, account_id: &str, api_token: &str, timeout: Duration) -> Result<Self, CloudflareError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CloudflareError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// Account id this client acts on
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Create a KV namespace and return its id
    pub async fn create_kv_namespace(&self, title: &str) -> Result<String, CloudflareError> {
        let url = self.endpoint(&["storage", "kv", "namespaces"])?;
        let req = self.request(Method::POST, url).json(&serde_json::json!({ "title": title }));
        let result: NamespaceResult = self.send_envelope(req).await?;
        Ok(result.id)
    }

    /// Delete a KV namespace
    pub async fn delete_kv_namespace(&self, namespace_id: &str) -> Result<(), CloudflareError> {
        let url = self.endpoint(&["storage", "kv", "namespaces", namespace_id])?;
        self.send_unit(self.request(Method::DELETE, url)).await
    }

    /// Upload (create or replace) a worker script
    pub async fn upload_worker(&self, script_name: &str, script: Bytes) -> Result<(), CloudflareError> {
        let url = self.endpoint(&["workers", "scripts", script_name])?;
        let req = self
            .request(Method::PUT, url)
            .header(reqwest::header::CONTENT_TYPE, "application/javascript")
            .body(script);
        self.send_unit(req).await
    }

    /// Delete a worker script
    pub async fn delete_worker(&self, script_name: &str) -> Result<(), CloudflareError> {
        let url = self.endpoint(&["workers", "scripts", script_name])?;
        self.send_unit(self.request(Method::DELETE, url)).await
    }

    /// Replace the script's resource bindings
    pub async fn put_bindings(&self, script_name: &str, bindings: &[Binding]) -> Result<(), CloudflareError> {
        let url = self.endpoint(&["workers", "scripts", script_name, "bindings"])?;
        let req = self
            .request(Method::PUT, url)
            .json(&serde_json::json!({ "bindings": bindings }));
        self.send_unit(req).await
    }

    /// Enable the `workers.dev` route for the script
    pub async fn enable_subdomain(&self, script_name: &str) -> Result<(), CloudflareError> {
        let url = self.endpoint(&["workers", "scripts", script_name, "subdomain"])?;
        let req = self
            .request(Method::POST, url)
            .json(&serde_json::json!({ "enabled": true }));
        self.send_unit(req).await
    }

    /// Replace the script's settings bindings (environment values)
    pub async fn put_settings(&self, script_name: &str, bindings: &[Binding]) -> Result<(), CloudflareError> {
        let url = self.endpoint(&["workers", "scripts", script_name, "settings"])?;
        let req = self
            .request(Method::PUT, url)
            .json(&serde_json::json!({ "bindings": bindings }));
        self.send_unit(req).await
    }

    /// Read a KV value; `None` when absent or expired
    pub async fn kv_get(&self, namespace_id: &str, key: &str) -> Result<Option<Bytes>, CloudflareError> {
        let url = self.endpoint(&["storage", "kv", "namespaces", namespace_id, "values", key])?;
        let resp = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| CloudflareError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| CloudflareError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        Ok(Some(body))
    }

    /// Write a KV value that expires after `ttl`
    pub async fn kv_put(
        &self,
        namespace_id: &str,
        key: &str,
        value: Bytes,
        ttl: Duration,
    ) -> Result<(), CloudflareError> {
        let mut url = self.endpoint(&["storage", "kv", "namespaces", namespace_id, "values", key])?;
        url.query_pairs_mut()
            .append_pair("expiration_ttl", &ttl.as_secs().to_string());
        self.send_unit(self.request(Method::PUT, url).body(value)).await
    }

    /// Delete a KV value
    pub async fn kv_delete(&self, namespace_id: &str, key: &str) -> Result<(), CloudflareError> {
        let url = self.endpoint(&["storage", "kv", "namespaces", namespace_id, "values", key])?;
        self.send_unit(self.request(Method::DELETE, url)).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CloudflareError> {
        let mut url = Url::parse(&self.api_base).map_err(|e| CloudflareError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| CloudflareError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .extend(["accounts", self.account_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.api_token)
    }

    async fn send_envelope<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, CloudflareError> {
        let resp = req
            .send()
            .await
            .map_err(|e| CloudflareError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| CloudflareError::Transport(e.to_string()))?;

        let envelope: Envelope<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(api_error(status, &body)),
            Err(e) => return Err(CloudflareError::Decode(e.to_string())),
        };

        if !envelope.success || !status.is_success() {
            return Err(CloudflareError::Api { status: status.as_u16(), errors: envelope.errors });
        }
        envelope
            .result
            .ok_or_else(|| CloudflareError::Decode("missing result".into()))
    }

    async fn send_unit(&self, req: reqwest::RequestBuilder) -> Result<(), CloudflareError> {
        self.send_envelope::<serde_json::Value>(req).await.map(|_| ()).or_else(|e| match e {
            // Some endpoints answer `"result": null` on success
            CloudflareError::Decode(msg) if msg == "missing result" => Ok(()),
            other => Err(other),
        })
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> CloudflareError {
    let errors = serde_json::from_slice::<Envelope<serde_json::Value>>(body)
        .map(|e| e.errors)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()));
    CloudflareError::Api { status: status.as_u16(), errors }
}
