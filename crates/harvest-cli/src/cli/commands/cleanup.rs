//! `harvest delete-failed` and `harvest delete-completed`.

use anyhow::Result;
use harvest_core::scheduler::DownloadManager;

pub async fn run_delete_failed(manager: &DownloadManager) -> Result<()> {
    let n = manager.delete_failed().await?;
    println!("Deleted {n} failed download(s); their URLs are now on the skip list");
    Ok(())
}

pub async fn run_delete_completed(manager: &DownloadManager) -> Result<()> {
    let n = manager.delete_completed().await?;
    println!("Deleted {n} completed download(s)");
    Ok(())
}
