//! `harvest add <url>...` – queue once-downloads.

use anyhow::Result;
use harvest_core::scheduler::{DownloadManager, DownloadRequest};
use std::path::PathBuf;

use super::poke_daemon;

pub async fn run_add(
    manager: &DownloadManager,
    urls: &[String],
    downloader: Option<String>,
    sub_downloader: Option<String>,
    destination: Option<PathBuf>,
    reset_attempts: bool,
) -> Result<()> {
    let request = DownloadRequest {
        downloader,
        sub_downloader,
        reset_attempts,
        skip_download: true,
        destination: destination.map(|d| serde_json::Value::String(d.display().to_string())),
        settings: None,
    };
    let rows = manager.create_downloads(urls, &request).await?;
    for d in &rows {
        println!(
            "Queued download {} for {} (downloader: {})",
            d.id,
            d.url,
            d.downloader.as_deref().unwrap_or("-")
        );
    }
    let skipped = urls.len() - rows.len();
    if skipped > 0 {
        println!("Skipped {skipped} URL(s) on the skip list");
    }
    if !rows.is_empty() {
        poke_daemon().await;
    }
    Ok(())
}
