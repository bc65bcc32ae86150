//! `harvest remove <id>` – delete a download record (downloaded files are kept).

use anyhow::Result;
use harvest_core::scheduler::DownloadManager;

pub async fn run_remove(manager: &DownloadManager, id: i64) -> Result<()> {
    if manager.delete_download(id).await? {
        println!("Removed download {id}");
    } else {
        println!("No download with id {id}");
    }
    Ok(())
}
