//! `fittrack tunnel` and `fittrack update-tunnel`

use super::{wait_for_interrupt, Session};
use crate::client::TunnelUpdate;
use crate::tunnel::{Tunnel, TunnelCommand};
use anyhow::Result;
use colored::Colorize;
use std::time::Duration;

/// Start a quick tunnel and remember its URL
pub async fn acquire(session: &mut Session, command: &TunnelCommand, timeout: Duration) -> Result<Tunnel> {
    let tunnel = Tunnel::start(command, timeout).await?;
    session.config.tunnel_url = Some(tunnel.url.clone());
    session.save()?;
    Ok(tunnel)
}

/// Point the tenant's edge at `tunnel_url`
pub async fn rebind(session: &mut Session, trainer_id: &str, tunnel_url: &str) -> Result<TunnelUpdate> {
    let update = session.client.update_tunnel(trainer_id, tunnel_url).await?;
    tracing::info!(trainer_id, tunnel_url, "Origin rebound");

    session.config.tunnel_url = Some(tunnel_url.to_string());
    session.config.onboarded = true;
    session.save()?;
    Ok(update)
}

pub async fn handle_tunnel(
    session: &mut Session,
    command: TunnelCommand,
    timeout: Duration,
    update: bool,
) -> Result<()> {
    let tunnel = acquire(session, &command, timeout).await?;
    println!("{} {}", "Tunnel ready:".green().bold(), tunnel.url.cyan());

    if update {
        let id = session.trainer_id(None)?;
        let result = rebind(session, &id, &tunnel.url).await?;
        println!("{} {}", result.message, result.worker_url.cyan());
    }

    println!("{}", "Press Ctrl+C to stop the tunnel".dimmed());
    wait_for_interrupt().await?;
    tunnel.stop().await;
    Ok(())
}

pub async fn handle_update(session: &mut Session, id: Option<String>, tunnel_url: String) -> Result<()> {
    let id = session.trainer_id(id)?;
    let update = rebind(session, &id, &tunnel_url).await?;
    if session.is_table() {
        println!("{}", update.message.green());
    }
    session.format.print(&update)
}
