//! Quick-tunnel acquisition
//!
//! Starts `cloudflared tunnel --url <local>` and waits a bounded time for a
//! `*.trycloudflare.com` address to show up on its output. The child keeps
//! running for as long as the returned handle lives.

use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Default bound on tunnel startup
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunnel startup errors
#[derive(Debug, Error)]
pub enum TunnelError {
    /// Binary missing or not executable
    #[error("Failed to start tunnel: {0}")]
    Spawn(#[from] std::io::Error),
    /// No URL within the bound
    #[error("Tunnel startup timeout after {0:?}")]
    Timeout(Duration),
    /// Process ended before publishing a URL
    #[error("Tunnel process exited before publishing a URL")]
    Exited,
}

/// Program and arguments that publish a tunnel
#[derive(Debug, Clone)]
pub struct TunnelCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TunnelCommand {
    /// `cloudflared tunnel --url <local>`
    pub fn cloudflared(binary: &str, local: &str) -> Self {
        Self {
            program: binary.to_string(),
            args: vec!["tunnel".into(), "--url".into(), local.into()],
        }
    }
}

/// Running tunnel
pub struct Tunnel {
    pub url: String,
    child: Child,
}

impl Tunnel {
    /// Spawn and wait up to `timeout` for the public URL
    pub async fn start(command: &TunnelCommand, timeout: Duration) -> Result<Self, TunnelError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (tx, mut rx) = mpsc::channel::<String>(1);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(watch(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(watch(stderr, tx.clone()));
        }
        drop(tx);

        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(url)) => {
                tracing::info!(url = %url, "Tunnel ready");
                Ok(Self { url, child })
            }
            Ok(None) => {
                let _ = child.kill().await;
                Err(TunnelError::Exited)
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(TunnelError::Timeout(timeout))
            }
        }
    }

    /// Stop the tunnel process
    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!("Failed to stop tunnel: {}", e);
        }
    }
}

// Forwards the first URL seen on a stream, then keeps draining it so the
// child never blocks on a full pipe
async fn watch<R: AsyncRead + Unpin>(stream: R, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(stream).lines();
    let mut sent = false;
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "cloudflared", "{}", line);
        if !sent {
            if let Some(url) = scan_for_tunnel_url(&line) {
                sent = tx.send(url.to_string()).await.is_ok();
            }
        }
    }
}

/// First quick-tunnel URL in `text`
pub fn scan_for_tunnel_url(text: &str) -> Option<&str> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"https://[a-z0-9-]+\.trycloudflare\.com").unwrap_or_else(|e| panic!("invalid tunnel pattern: {e}"))
        })
        .find(text)
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> TunnelCommand {
        TunnelCommand { program: "sh".into(), args: vec!["-c".into(), script.into()] }
    }

    #[test]
    fn test_scan() {
        let line = "2024-01-01T00:00:00Z INF |  https://quiet-river-42.trycloudflare.com  |";
        assert_eq!(scan_for_tunnel_url(line), Some("https://quiet-river-42.trycloudflare.com"));
        assert_eq!(scan_for_tunnel_url("INF Requesting new quick Tunnel on trycloudflare.com..."), None);
        assert_eq!(scan_for_tunnel_url("https://api.trycloudflare.com.evil"), Some("https://api.trycloudflare.com"));
        assert_eq!(scan_for_tunnel_url("https://UPPER.trycloudflare.com"), None);
    }

    #[test]
    fn test_cloudflared_args() {
        let cmd = TunnelCommand::cloudflared("cloudflared", "http://localhost:8000");
        assert_eq!(cmd.args, vec!["tunnel", "--url", "http://localhost:8000"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_url_on_stderr() {
        let cmd = sh("echo starting; echo 'INF | https://quiet-river-42.trycloudflare.com |' >&2; sleep 5");
        let tunnel = Tunnel::start(&cmd, Duration::from_secs(5)).await.unwrap();
        assert_eq!(tunnel.url, "https://quiet-river-42.trycloudflare.com");
        tunnel.stop().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let err = Tunnel::start(&sh("sleep 5"), Duration::from_millis(200)).await.err().unwrap();
        assert!(matches!(err, TunnelError::Timeout(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_without_url() {
        let err = Tunnel::start(&sh("echo nothing here"), Duration::from_secs(5)).await.err().unwrap();
        assert!(matches!(err, TunnelError::Exited));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let cmd = TunnelCommand::cloudflared("/nonexistent/cloudflared", "http://localhost:8000");
        let err = Tunnel::start(&cmd, Duration::from_secs(1)).await.err().unwrap();
        assert!(matches!(err, TunnelError::Spawn(_)));
    }
}
