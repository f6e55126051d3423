//! HTTP front of the edge router

use crate::router::EdgeRouter;
use crate::message::EdgeRequest;
use crate::EdgeError;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Largest request body buffered for forwarding
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Every path goes through the edge router
pub fn app(edge: Arc<EdgeRouter>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(edge)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(State(edge): State<Arc<EdgeRouter>>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Rejected request body: {}", e);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let req = EdgeRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(String::from),
        headers: parts.headers,
        body,
    };
    edge.handle(req).await.into_response()
}

/// Serve until Ctrl-C, then drain pending cache writes
pub async fn start_server(addr: &str, edge: Arc<EdgeRouter>) -> Result<(), EdgeError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EdgeError::Network(e.to_string()))?;
    tracing::info!("Edge router listening on {}", addr);

    axum::serve(listener, app(edge.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EdgeError::Network(e.to_string()))?;

    edge.writer().shutdown().await;
    let stats = edge.stats();
    tracing::info!(stats = ?stats, "Edge router stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EdgeConfig;
    use crate::message::EdgeResponse;
    use crate::origin::{OriginClient, OriginError, OriginRequest};
    use crate::router::EdgeBackends;
    use async_trait::async_trait;
    use axum::body::Body;
    use fittrack_common::{MemoryKv, MemoryObjectStore};
    use tower::ServiceExt;

    struct DownOrigin;

    #[async_trait]
    impl OriginClient for DownOrigin {
        async fn fetch(&self, _req: OriginRequest) -> Result<EdgeResponse, OriginError> {
            Err(OriginError::Unreachable("connection refused".into()))
        }
    }

    fn edge() -> Arc<EdgeRouter> {
        Arc::new(EdgeRouter::new(
            &EdgeConfig::default(),
            EdgeBackends {
                origin: Arc::new(DownOrigin),
                kv: Arc::new(MemoryKv::new()),
                objects: Arc::new(MemoryObjectStore::new()),
            },
        ))
    }

    #[tokio::test]
    async fn test_health_over_http() {
        let resp = app(edge())
            .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["worker"], "fittrack-pro");
    }

    #[tokio::test]
    async fn test_origin_down_over_http() {
        let resp = app(edge())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/ai/suggest-meal?goal=cut")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Service unavailable");
    }

    #[tokio::test]
    async fn test_unmatched_over_http() {
        let resp = app(edge())
            .oneshot(
                axum::http::Request::builder()
                    .method("DELETE")
                    .uri("/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
