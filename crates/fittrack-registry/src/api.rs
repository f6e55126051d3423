//! Registration API

use crate::model::{TenantSummary, TenantView};
use crate::provisioner::{Provisioner, RegisterRequest, Registration, TunnelUpdate, UpdateTunnelRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fittrack_common::ApiError;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state
pub type AppState = Arc<Provisioner>;

/// `GET /trainers` body
#[derive(Debug, Serialize)]
pub struct TrainerList {
    /// Redacted tenants
    pub trainers: Vec<TenantSummary>,
}

/// Registry routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/update-tunnel", post(update_tunnel))
        .route("/trainer/:id", get(get_trainer))
        .route("/trainers", get(list_trainers))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn start_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("FitTrack registry listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
            }
        })
        .await
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "trainers": state.count().await }))
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Registration>, ApiError> {
    let Json(req) = body.map_err(rejected)?;
    state.register(req).await.map(Json)
}

async fn update_tunnel(
    State(state): State<AppState>,
    body: Result<Json<UpdateTunnelRequest>, JsonRejection>,
) -> Result<Json<TunnelUpdate>, ApiError> {
    let Json(req) = body.map_err(rejected)?;
    state.rebind_origin(req).await.map(Json)
}

async fn get_trainer(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<TenantView>, ApiError> {
    state.get_tenant(&id).await.map(Json)
}

async fn list_trainers(State(state): State<AppState>) -> Json<TrainerList> {
    Json(TrainerList { trainers: state.list_tenants().await })
}

fn rejected(rejection: JsonRejection) -> ApiError {
    ApiError::InvalidInput(rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::testing::RecordingCloud;
    use crate::provisioner::ProvisionerSettings;
    use crate::store::MemoryTenantStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use tower::ServiceExt;

    fn app(cloud: Arc<RecordingCloud>) -> Router {
        let settings = ProvisionerSettings {
            registration_secret: "S".into(),
            worker_prefix: "fittrack".into(),
            workers_domain: "workers.dev".into(),
            kv_binding: "FITTRACK_KV".into(),
        };
        let provisioner = Provisioner::new(
            settings,
            cloud,
            Arc::new(MemoryTenantStore::new()),
            Bytes::from_static(b"script"),
        );
        router(Arc::new(provisioner))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    #[tokio::test]
    async fn test_register_flow() {
        let app = app(Arc::new(RecordingCloud::default()));

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "trainers": 0 }));

        let (status, reg) = call(
            &app,
            "POST",
            "/register",
            Some(json!({
                "trainer_name": "Jane Doe",
                "trainer_email": "jane@x.com",
                "registration_secret": "S"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reg["success"], true);
        assert_eq!(reg["worker_url"], "https://fittrackjanedoe.workers.dev");
        assert_eq!(reg["kv_namespace_id"], "ns-1");
        let id = reg["trainer_id"].as_str().unwrap().to_string();

        let (status, view) = call(&app, "GET", &format!("/trainer/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["name"], "Jane Doe");
        assert!(view.get("kv_namespace_id").is_none());

        let (status, update) = call(
            &app,
            "POST",
            "/update-tunnel",
            Some(json!({
                "trainer_id": id,
                "tunnel_url": "https://abc.trycloudflare.com",
                "registration_secret": "S"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(update["message"], "Tunnel URL updated");

        let (_, list) = call(&app, "GET", "/trainers", None).await;
        let trainers = list["trainers"].as_array().unwrap();
        assert_eq!(trainers.len(), 1);
        assert_eq!(
            trainers[0].as_object().unwrap().keys().cloned().collect::<Vec<_>>(),
            vec!["created_at", "email", "id", "name", "worker_url"]
        );

        let (_, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(body["trainers"], 1);
    }

    #[tokio::test]
    async fn test_error_bodies() {
        let app = app(Arc::new(RecordingCloud::failing(&["create_namespace"])));

        let (status, body) = call(
            &app,
            "POST",
            "/register",
            Some(json!({ "trainer_name": "Jane", "trainer_email": "j@x.com", "registration_secret": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Invalid registration secret" }));

        let (status, body) = call(&app, "POST", "/register", Some(json!({ "registration_secret": "S" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "trainer_name and trainer_email required" }));

        let (status, body) = call(
            &app,
            "POST",
            "/register",
            Some(json!({ "trainer_name": "Jane", "trainer_email": "j@x.com", "registration_secret": "S" })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Registration failed");
        assert_eq!(body["details"][0]["code"], 10000);

        let (status, body) = call(&app, "GET", "/trainer/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Trainer not found" }));

        let (status, body) = call(
            &app,
            "POST",
            "/update-tunnel",
            Some(json!({ "trainer_id": "unknown", "tunnel_url": "https://x", "registration_secret": "S" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Trainer not found");
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = app(Arc::new(RecordingCloud::default()));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/register")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
