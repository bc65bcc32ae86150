//! `harvest status` – show all downloads and per-status counts.

use anyhow::Result;
use harvest_core::job_db::{DownloadFilter, DownloadStatus};
use harvest_core::scheduler::DownloadManager;

fn format_next(next: Option<i64>, now: i64) -> String {
    match next {
        None => "-".to_string(),
        Some(t) if t <= now => "due".to_string(),
        Some(t) => {
            let secs = t - now;
            if secs >= 86_400 {
                format!("in {}d", secs / 86_400)
            } else if secs >= 3_600 {
                format!("in {}h", secs / 3_600)
            } else {
                format!("in {}m", (secs / 60).max(1))
            }
        }
    }
}

pub async fn run_status(manager: &DownloadManager, filter: &str) -> Result<()> {
    let filter = match filter {
        "once" => DownloadFilter::Once,
        "recurring" => DownloadFilter::Recurring,
        _ => DownloadFilter::All,
    };
    let downloads = manager.list_downloads(filter).await?;
    if downloads.is_empty() {
        println!("No downloads in database.");
        return Ok(());
    }

    let now = harvest_core::job_db::unix_timestamp();
    println!(
        "{:<6} {:<9} {:<4} {:<10} {:<8} {}",
        "ID", "STATUS", "TRY", "DOWNLOADER", "NEXT", "URL"
    );
    for d in &downloads {
        println!(
            "{:<6} {:<9} {:<4} {:<10} {:<8} {}",
            d.id,
            d.status.as_str(),
            d.attempts,
            d.downloader.as_deref().unwrap_or("-"),
            format_next(d.next_download, now),
            d.url
        );
        if let Some(err) = d.error.as_deref().filter(|_| d.status != DownloadStatus::Complete) {
            println!("       error: {}", err.lines().next().unwrap_or(""));
        }
    }

    let counts = manager.status_counts().await?;
    let summary: Vec<String> = DownloadStatus::ALL
        .iter()
        .map(|s| format!("{} {}", counts.get(*s), s))
        .collect();
    println!("\n{}", summary.join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::format_next;

    #[test]
    fn next_download_is_relative() {
        assert_eq!(format_next(None, 100), "-");
        assert_eq!(format_next(Some(50), 100), "due");
        assert_eq!(format_next(Some(100 + 90), 100), "in 1m");
        assert_eq!(format_next(Some(100 + 3 * 3_600), 100), "in 3h");
        assert_eq!(format_next(Some(100 + 8 * 86_400), 100), "in 8d");
    }
}
