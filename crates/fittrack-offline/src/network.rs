//! Client requests, responses and the network they go to

use crate::OfflineError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use url::Url;

/// How the client issued the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level page navigation
    Navigate,
    /// Subresource or script-issued fetch
    Subresource,
}

/// Request issued by the client application
#[derive(Debug, Clone)]
pub struct ClientRequest {
    /// Method
    pub method: Method,
    /// Absolute URL
    pub url: Url,
    /// Navigation or subresource
    pub mode: RequestMode,
    /// Headers
    pub headers: HeaderMap,
}

impl ClientRequest {
    /// GET subresource request
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, mode: RequestMode::Subresource, headers: HeaderMap::new() }
    }

    /// Page navigation
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    /// Request with another method
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// Buffered response
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
    /// Status
    pub status: StatusCode,
    /// Headers
    pub headers: HeaderMap,
    /// Body
    pub body: Bytes,
}

impl ClientResponse {
    /// Response without headers
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    /// 2xx
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }
}

/// Where cache misses go
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch; `Err` only when no response was obtained
    async fn fetch(&self, req: &ClientRequest) -> Result<ClientResponse, OfflineError>;
}

/// reqwest-backed network
#[derive(Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    /// Network with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, OfflineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OfflineError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, req: &ClientRequest) -> Result<ClientResponse, OfflineError> {
        let resp = self
            .client
            .request(req.method.clone(), req.url.clone())
            .headers(req.headers.clone())
            .send()
            .await
            .map_err(|e| OfflineError::Network(e.to_string()))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|e| OfflineError::Network(e.to_string()))?;
        Ok(ClientResponse { status, headers, body })
    }
}
