//! `harvest kill <id>` – stop one download. A running daemon kills its process.

use anyhow::Result;
use harvest_core::scheduler::DownloadManager;

use crate::cli::control_socket::{self, ControlRequest};

pub async fn run_kill(manager: &DownloadManager, id: i64) -> Result<()> {
    if control_socket::notify_daemon(ControlRequest::KillDownload(id)).await {
        println!("Asked daemon to kill download {id}");
        return Ok(());
    }
    if manager.kill_download(id).await? {
        println!("Killed download {id}");
    } else {
        println!("No download with id {id}");
    }
    Ok(())
}
