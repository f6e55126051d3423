//! Request/response values flowing through the router

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

/// Inbound request, fully buffered
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    /// HTTP method
    pub method: Method,
    /// Path without query
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl EdgeRequest {
    /// Bodiless request, mostly for tests and health probes
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path_and_query.to_string(), None),
        };
        Self { method, path, query, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// GET request
    pub fn get(path_and_query: &str) -> Self {
        Self::new(Method::GET, path_and_query)
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Outbound response, fully buffered
#[derive(Debug, Clone)]
pub struct EdgeResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl EdgeResponse {
    /// Response with no headers
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    /// `text/plain` response
    pub fn text(status: StatusCode, body: &'static str) -> Self {
        Self::new(status, body).with_header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
    }

    /// `application/json` response
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header(header::CONTENT_TYPE, "application/json")
    }

    /// Set a static header value
    pub fn with_header(mut self, name: header::HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    /// Header value as text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for EdgeResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_query() {
        let req = EdgeRequest::get("/api/clients/1/meals?day=mon&limit=2");
        assert_eq!(req.path, "/api/clients/1/meals");
        assert_eq!(req.query.as_deref(), Some("day=mon&limit=2"));

        let req = EdgeRequest::get("/health");
        assert!(req.query.is_none());
    }

    #[test]
    fn test_text_response() {
        let resp = EdgeResponse::text(StatusCode::NOT_FOUND, "Not found");
        assert_eq!(resp.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(resp.body, Bytes::from_static(b"Not found"));
    }
}
