//! `harvest recurring <url> --every <duration>` – download a URL on a schedule.

use anyhow::Result;
use harvest_core::scheduler::{DownloadManager, DownloadRequest};
use std::path::PathBuf;

use super::poke_daemon;

pub async fn run_recurring(
    manager: &DownloadManager,
    url: &str,
    every: i64,
    downloader: Option<String>,
    sub_downloader: Option<String>,
    destination: Option<PathBuf>,
) -> Result<()> {
    let request = DownloadRequest {
        downloader,
        sub_downloader,
        destination: destination.map(|d| serde_json::Value::String(d.display().to_string())),
        ..Default::default()
    };
    match manager.recurring_download(url, every, &request).await? {
        Some(d) => {
            println!("Recurring download {} for {} every {}s", d.id, d.url, every);
            poke_daemon().await;
        }
        None => println!("{url} is on the skip list; not added"),
    }
    Ok(())
}
