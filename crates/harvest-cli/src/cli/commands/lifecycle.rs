//! `harvest stop|enable|disable` – control a running daemon.

use anyhow::Result;
use harvest_core::scheduler::DownloadManager;

use crate::cli::control_socket::{self, ControlRequest};

pub async fn run_stop(manager: &DownloadManager) -> Result<()> {
    if control_socket::notify_daemon(ControlRequest::Stop).await {
        println!("Asked daemon to stop running downloads");
        return Ok(());
    }
    // No daemon: just park anything left `pending` by a crash.
    let n = manager.stop().await?;
    println!("Deferred {n} pending download(s)");
    Ok(())
}

pub async fn run_enable() -> Result<()> {
    if control_socket::notify_daemon(ControlRequest::Enable).await {
        println!("Downloads enabled");
    } else {
        println!("No daemon running; downloads start with `harvest run`.");
    }
    Ok(())
}

pub async fn run_disable() -> Result<()> {
    if control_socket::notify_daemon(ControlRequest::Disable).await {
        println!("Downloads disabled");
    } else {
        println!("No daemon running.");
    }
    Ok(())
}
