//! Control socket: server (during `harvest run`) and client (other commands).
//! Protocol: one line per command: `kill <id>`, `stop`, `kill-all`, `enable`,
//! `disable` or `pass`.

use anyhow::Result;
use harvest_core::scheduler::DownloadManager;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Stop one download (`DownloadManager::kill_download`).
    KillDownload(i64),
    Stop,
    /// Disable and stop.
    KillAll,
    Enable,
    Disable,
    /// Start a scheduling pass now.
    Pass,
}

impl ControlRequest {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let req = match (parts.next()?, parts.next()) {
            ("kill", Some(id)) => Self::KillDownload(id.parse().ok()?),
            ("stop", None) => Self::Stop,
            ("kill-all", None) => Self::KillAll,
            ("enable", None) => Self::Enable,
            ("disable", None) => Self::Disable,
            ("pass", None) => Self::Pass,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(req)
    }

    fn to_line(self) -> String {
        match self {
            Self::KillDownload(id) => format!("kill {id}\n"),
            Self::Stop => "stop\n".to_string(),
            Self::KillAll => "kill-all\n".to_string(),
            Self::Enable => "enable\n".to_string(),
            Self::Disable => "disable\n".to_string(),
            Self::Pass => "pass\n".to_string(),
        }
    }
}

async fn apply(manager: &DownloadManager, req: ControlRequest) -> Result<()> {
    match req {
        ControlRequest::KillDownload(id) => {
            manager.kill_download(id).await?;
        }
        ControlRequest::Stop => {
            manager.stop().await?;
        }
        ControlRequest::KillAll => {
            manager.kill().await?;
        }
        ControlRequest::Enable => manager.enable().await?,
        ControlRequest::Disable => manager.disable(),
        ControlRequest::Pass => {
            let manager = manager.clone();
            tokio::spawn(async move {
                if let Err(e) = manager.dispatch_downloads().await {
                    tracing::error!("scheduling pass failed: {:#}", e);
                }
            });
        }
    }
    Ok(())
}

/// Spawns a task that listens on `path` and applies each request line to
/// `manager`. Malformed lines are logged and ignored.
pub fn spawn_control_listener(
    manager: DownloadManager,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let manager = manager.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            let Some(req) = ControlRequest::parse(line.trim()) else {
                                tracing::debug!(line = %line, "ignoring control line");
                                continue;
                            };
                            tracing::info!(?req, "control request");
                            if let Err(e) = apply(&manager, req).await {
                                tracing::warn!(?req, "control request failed: {:#}", e);
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends `req` to a running daemon. Returns false if no daemon is listening.
pub async fn send(socket_path: &Path, req: ControlRequest) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        // Stale socket left by a daemon that exited uncleanly.
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    stream.write_all(req.to_line().as_bytes()).await?;
    stream.shutdown().await?;
    Ok(true)
}

/// `send` to the default socket path; false when the path is unavailable or nobody listens.
pub async fn notify_daemon(req: ControlRequest) -> bool {
    let Ok(path) = harvest_core::control::default_control_socket_path() else {
        return false;
    };
    match send(&path, req).await {
        Ok(sent) => sent,
        Err(e) => {
            tracing::debug!("control socket send: {:#}", e);
            false
        }
    }
}
