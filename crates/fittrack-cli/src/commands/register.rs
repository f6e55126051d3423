//! `fittrack register`

use super::Session;
use crate::client::Registration;
use anyhow::Result;
use colored::Colorize;

/// Register the trainer and remember the result in the local profile
pub async fn register(
    session: &mut Session,
    name: &str,
    email: &str,
    phone: Option<&str>,
) -> Result<Registration> {
    let registration = session.client.register(name, email, phone).await?;
    tracing::info!(trainer_id = %registration.trainer_id, "Registered");

    session.config.trainer_id = Some(registration.trainer_id.clone());
    session.config.worker_url = Some(registration.worker_url.clone());
    session.config.name = Some(name.to_string());
    session.config.email = Some(email.to_string());
    session.config.phone = phone.map(String::from);
    session.config.tunnel_url = None;
    session.config.onboarded = false;
    session.save()?;

    Ok(registration)
}

pub async fn handle(session: &mut Session, name: String, email: String, phone: Option<String>) -> Result<()> {
    let registration = register(session, &name, &email, phone.as_deref()).await?;
    if session.is_table() {
        println!("{} {}", "Registered".green().bold(), registration.worker_url.cyan());
    }
    session.format.print(&registration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{serve, session};
    use crate::config::Config;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_register_saves_profile() {
        let app = Router::new().route(
            "/register",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["trainer_name"], "Jane Doe");
                Json(json!({
                    "success": true,
                    "trainer_id": "t-1",
                    "worker_url": "https://fittrackjanedoe.workers.dev",
                    "kv_namespace_id": "ns-1",
                    "message": "Trainer registered successfully"
                }))
            }),
        );
        let base = serve(app).await;
        let mut session = session(&base, "register");

        register(&mut session, "Jane Doe", "jane@x.com", Some("555")).await.unwrap();

        let saved = Config::load_from(&session.config_path).unwrap();
        assert_eq!(saved.trainer_id.as_deref(), Some("t-1"));
        assert_eq!(saved.worker_url.as_deref(), Some("https://fittrackjanedoe.workers.dev"));
        assert_eq!(saved.phone.as_deref(), Some("555"));
        assert!(!saved.onboarded);
    }

    #[tokio::test]
    async fn test_failed_register_leaves_profile() {
        let app = Router::new().route(
            "/register",
            post(|| async {
                (axum::http::StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid registration secret" })))
            }),
        );
        let base = serve(app).await;
        let mut session = session(&base, "register-fail");

        let err = register(&mut session, "Jane", "j@x.com", None).await.unwrap_err();
        assert!(err.to_string().contains("Invalid registration secret"));
        assert!(!session.config_path.exists());
    }
}
