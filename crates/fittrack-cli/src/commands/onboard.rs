//! `fittrack onboard`
//!
//! Registers on first run, then brings up a tunnel and points the tenant's
//! edge at it. Later runs skip registration and only rebind.

use super::register::register;
use super::tunnel::{acquire, rebind};
use super::{wait_for_interrupt, Session};
use crate::tunnel::TunnelCommand;
use anyhow::{bail, Result};
use colored::Colorize;
use std::time::Duration;

pub struct OnboardArgs {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub command: TunnelCommand,
    pub timeout: Duration,
}

pub async fn handle(session: &mut Session, args: OnboardArgs) -> Result<()> {
    let trainer_id = match session.config.trainer_id.clone() {
        Some(id) => id,
        None => {
            let (Some(name), Some(email)) = (args.name.as_deref(), args.email.as_deref()) else {
                bail!("Not registered yet: pass --name and --email");
            };
            println!("{}", "Registering...".dimmed());
            register(session, name, email, args.phone.as_deref()).await?.trainer_id
        }
    };

    println!("{}", "Starting tunnel...".dimmed());
    let tunnel = acquire(session, &args.command, args.timeout).await?;
    let update = rebind(session, &trainer_id, &tunnel.url).await?;

    println!("{}", "Onboarding complete".green().bold());
    println!("  Public URL: {}", update.worker_url.cyan());
    println!("  Tunnel:     {}", tunnel.url);
    println!("{}", "Press Ctrl+C to go offline".dimmed());

    wait_for_interrupt().await?;
    tunnel.stop().await;
    Ok(())
}
