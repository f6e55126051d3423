//! Origin client
//!
//! Forwards a request to an absolute URL and returns the buffered result or
//! a transport failure. Stateless; no retries.

use crate::message::EdgeResponse;
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Headers that describe one hop and must not be forwarded
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Outbound request to an origin
#[derive(Debug, Clone)]
pub struct OriginRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute target URL
    pub url: String,
    /// Headers to forward
    pub headers: HeaderMap,
    /// Body; `None` for GET
    pub body: Option<Bytes>,
}

/// Transport-level failure: no response was obtained
#[derive(Debug, Error)]
pub enum OriginError {
    /// Connection refused, DNS failure, TLS failure, reset, timeout
    #[error("origin unreachable: {0}")]
    Unreachable(String),
    /// Target URL or method could not be expressed
    #[error("invalid origin request: {0}")]
    InvalidRequest(String),
}

/// Something that can forward a request
#[async_trait]
pub trait OriginClient: Send + Sync {
    /// Forward and buffer the response
    async fn fetch(&self, req: OriginRequest) -> Result<EdgeResponse, OriginError>;
}

/// reqwest-backed origin client
#[derive(Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    /// Client with an overall per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, OriginError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OriginError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OriginClient for HttpOrigin {
    async fn fetch(&self, req: OriginRequest) -> Result<EdgeResponse, OriginError> {
        let method = reqwest::Method::from_bytes(req.method.as_str().as_bytes())
            .map_err(|e| OriginError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, &req.url);
        for (name, value) in forwardable(&req.headers) {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_builder() {
                OriginError::InvalidRequest(e.to_string())
            } else {
                OriginError::Unreachable(e.to_string())
            }
        })?;

        let status = StatusCode::from_u16(resp.status().as_u16())
            .map_err(|e| OriginError::Unreachable(e.to_string()))?;
        let mut headers = HeaderMap::new();
        for (name, value) in resp.headers() {
            if is_hop_by_hop(name.as_str()) {
                continue;
            }
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.append(n, v);
            }
        }
        // A body cut off mid-stream is a transport failure too
        let body = resp
            .bytes()
            .await
            .map_err(|e| OriginError::Unreachable(e.to_string()))?;

        Ok(EdgeResponse { status, headers, body })
    }
}

/// Request headers minus hop-by-hop ones
pub fn forwardable(headers: &HeaderMap) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
    headers.iter().filter(|(name, _)| !is_hop_by_hop(name.as_str()))
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}
