//! `harvest restart <id>` – retry a download from zero attempts.

use anyhow::Result;
use harvest_core::scheduler::DownloadManager;

use super::poke_daemon;

pub async fn run_restart(manager: &DownloadManager, id: i64) -> Result<()> {
    if !manager.restart_download(id).await? {
        println!("No download with id {id}");
        return Ok(());
    }
    println!("Restarted download {id}");
    poke_daemon().await;
    Ok(())
}
