//! FitTrack CLI
//!
//! Companion client for trainers running their own backend.
//!
//! # Usage
//!
//! ```bash
//! fittrack register --name "Jane Doe" --email jane@example.com
//! fittrack onboard --local http://localhost:8000
//! fittrack update-tunnel https://quiet-river-42.trycloudflare.com
//! fittrack status --format json
//! fittrack trainers
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod config;
mod output;
mod tunnel;

#[derive(Parser)]
#[command(name = "fittrack")]
#[command(version)]
#[command(about = "FitTrack trainer companion", long_about = None)]
struct Cli {
    /// Registry endpoint URL
    #[arg(long, env = "FITTRACK_REGISTRY_URL")]
    registry_url: Option<String>,

    /// Registration secret
    #[arg(long, env = "REGISTRATION_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    format: output::OutputFormat,

    /// Profile name from config file
    #[arg(long, short)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TunnelArgs {
    /// Local backend to expose
    #[arg(long, default_value = "http://localhost:8000")]
    local: String,

    /// cloudflared binary
    #[arg(long, env = "CLOUDFLARED_PATH", default_value = "cloudflared")]
    cloudflared: String,

    /// Seconds to wait for the tunnel URL
    #[arg(long, default_value_t = tunnel::STARTUP_TIMEOUT.as_secs())]
    timeout: u64,
}

impl TunnelArgs {
    fn command(&self) -> tunnel::TunnelCommand {
        tunnel::TunnelCommand::cloudflared(&self.cloudflared, &self.local)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new trainer
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Start a quick tunnel to the local backend
    Tunnel {
        #[command(flatten)]
        tunnel: TunnelArgs,
        /// Also point the edge at the new tunnel
        #[arg(long)]
        update: bool,
    },
    /// Point the edge at a tunnel URL
    UpdateTunnel {
        tunnel_url: String,
        /// Trainer id (defaults to the registered one)
        #[arg(long)]
        id: Option<String>,
    },
    /// Register if needed, start a tunnel and bind it
    Onboard {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[command(flatten)]
        tunnel: TunnelArgs,
    },
    /// Show a trainer
    Status {
        /// Trainer id (defaults to the registered one)
        id: Option<String>,
    },
    /// List trainers
    Trainers,
}

const DEFAULT_REGISTRY_URL: &str = "http://localhost:3001";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = config::Config::config_path(cli.profile.as_deref())?;
    let config = config::Config::load_from(&config_path)?;

    let registry_url = cli
        .registry_url
        .or_else(|| config.registry_url.clone())
        .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
    let client = client::ApiClient::new(&registry_url, cli.secret.as_deref());

    let mut session = commands::Session { client, config, config_path, format: cli.format };
    session.config.registry_url = Some(registry_url);

    match cli.command {
        Commands::Register { name, email, phone } => {
            commands::register::handle(&mut session, name, email, phone).await
        }
        Commands::Tunnel { tunnel, update } => {
            commands::tunnel::handle_tunnel(&mut session, tunnel.command(), tunnel.timeout(), update).await
        }
        Commands::UpdateTunnel { tunnel_url, id } => {
            commands::tunnel::handle_update(&mut session, id, tunnel_url).await
        }
        Commands::Onboard { name, email, phone, tunnel } => {
            let args = commands::onboard::OnboardArgs {
                name,
                email,
                phone,
                command: tunnel.command(),
                timeout: tunnel.timeout(),
            };
            commands::onboard::handle(&mut session, args).await
        }
        Commands::Status { id } => commands::trainers::status(&session, id).await,
        Commands::Trainers => commands::trainers::list(&session).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_onboard_args() {
        let cli = Cli::try_parse_from([
            "fittrack", "--format", "json", "onboard", "--name", "Jane", "--email", "j@x.com", "--timeout", "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Onboard { name, tunnel, .. } => {
                assert_eq!(name.as_deref(), Some("Jane"));
                assert_eq!(tunnel.timeout(), Duration::from_secs(5));
                assert_eq!(tunnel.command().args, vec!["tunnel", "--url", "http://localhost:8000"]);
            }
            _ => panic!("expected onboard"),
        }
    }
}
