//! CLI Commands

pub mod onboard;
pub mod register;
pub mod trainers;
pub mod tunnel;

use crate::client::ApiClient;
use crate::config::Config;
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// State shared by every command: the registry client and the local profile
pub struct Session {
    pub client: ApiClient,
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
}

impl Session {
    pub fn save(&self) -> Result<()> {
        self.config.save_to(&self.config_path)
    }

    /// Explicit id, else the one saved by `register`
    pub fn trainer_id(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.config.trainer_id.clone())
            .context("No trainer id: pass one or run `fittrack register` first")
    }

    fn is_table(&self) -> bool {
        matches!(self.format, OutputFormat::Table)
    }
}

/// Block until Ctrl+C
pub(crate) async fn wait_for_interrupt() -> Result<()> {
    tokio::signal::ctrl_c().await.context("failed to install Ctrl+C handler")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use axum::Router;

    pub async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub fn session(base: &str, name: &str) -> Session {
        let config_path = std::env::temp_dir()
            .join(format!("fittrack-cmd-{}-{}", std::process::id(), name))
            .join("config.toml");
        let _ = std::fs::remove_file(&config_path);
        Session {
            client: ApiClient::new(base, Some("S")),
            config: Config::default(),
            config_path,
            format: OutputFormat::Json,
        }
    }
}
