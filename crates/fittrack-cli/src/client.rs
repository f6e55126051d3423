//! Registry API client

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Registry call errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// No response
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Registry answered with an error body
    #[error("{message} (HTTP {status}){}", details_suffix(.details))]
    Api {
        /// HTTP status
        status: u16,
        /// `error` field
        message: String,
        /// `details` field, if any
        details: Option<Value>,
    },

    /// Operation needs the registration secret
    #[error("registration secret required (--secret or REGISTRATION_SECRET)")]
    MissingSecret,
}

fn details_suffix(details: &Option<Value>) -> String {
    match details {
        Some(Value::String(s)) => format!(": {}", s),
        Some(other) => format!(": {}", other),
        None => String::new(),
    }
}

/// `POST /register` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub trainer_id: String,
    pub worker_url: String,
    pub kv_namespace_id: String,
    #[serde(default)]
    pub message: String,
}

/// `POST /update-tunnel` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelUpdate {
    pub message: String,
    pub worker_url: String,
}

/// `GET /trainer/:id` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trainer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub worker_name: String,
    pub worker_url: String,
    pub tunnel_url: Option<String>,
    pub created_at: String,
    pub last_tunnel_update: Option<String>,
    pub onboarded: bool,
}

/// Row of `GET /trainers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub worker_url: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
struct TrainerList {
    trainers: Vec<TrainerSummary>,
}

/// API client
pub struct ApiClient {
    base_url: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, secret: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.map(String::from),
            client: reqwest::Client::new(),
        }
    }

    pub async fn register(&self, name: &str, email: &str, phone: Option<&str>) -> Result<Registration, ClientError> {
        let body = json!({
            "trainer_name": name,
            "trainer_email": email,
            "trainer_phone": phone,
            "registration_secret": self.secret()?,
        });
        self.post("/register", &body).await
    }

    pub async fn update_tunnel(&self, trainer_id: &str, tunnel_url: &str) -> Result<TunnelUpdate, ClientError> {
        let body = json!({
            "trainer_id": trainer_id,
            "tunnel_url": tunnel_url,
            "registration_secret": self.secret()?,
        });
        self.post("/update-tunnel", &body).await
    }

    pub async fn trainer(&self, id: &str) -> Result<Trainer, ClientError> {
        self.get(&format!("/trainer/{}", id)).await
    }

    pub async fn trainers(&self) -> Result<Vec<TrainerSummary>, ClientError> {
        let list: TrainerList = self.get("/trainers").await?;
        Ok(list.trainers)
    }

    fn secret(&self) -> Result<&str, ClientError> {
        self.secret.as_deref().ok_or(ClientError::MissingSecret)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "GET");
        let resp = self.client.get(&url).send().await?;
        decode(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "POST");
        let resp = self.client.post(&url).json(body).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let body: Value = resp.json().await.unwrap_or(Value::Null);
    Err(ClientError::Api {
        status: status.as_u16(),
        message: body["error"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| status.to_string()),
        details: body.get("details").cloned(),
    })
}
