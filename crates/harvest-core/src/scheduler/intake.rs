//! Job intake: resolve a downloader for each URL and get-or-create its row.

use anyhow::Result;
use serde_json::Value;

use crate::job_db::{Download, NewDownload};

use super::DownloadManager;

/// Options shared by every URL of one intake call.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    /// Downloader to use; looked up in the registry when None.
    pub downloader: Option<String>,
    /// Downloader for child URLs the download produces.
    pub sub_downloader: Option<String>,
    pub reset_attempts: bool,
    /// Persist only; don't trigger a scheduling pass.
    pub skip_download: bool,
    pub destination: Option<Value>,
    pub settings: Option<Value>,
}

impl DownloadManager {
    /// Request a single once-download. Returns None if the URL is on the skip list.
    pub async fn create_download(
        &self,
        url: &str,
        request: &DownloadRequest,
    ) -> Result<Option<Download>> {
        let rows = self.create_downloads(&[url.to_string()], request).await?;
        Ok(rows.into_iter().next())
    }

    /// Request several once-downloads atomically.
    ///
    /// Skip-listed URLs are dropped silently. If any other URL has no matching
    /// downloader the whole batch fails with `InvalidDownload` and nothing is stored.
    pub async fn create_downloads(
        &self,
        urls: &[String],
        request: &DownloadRequest,
    ) -> Result<Vec<Download>> {
        let rows = self.intake(urls, request, None).await?;
        if !request.skip_download && !rows.is_empty() {
            self.trigger_pass().await?;
        }
        Ok(rows)
    }

    /// Request a recurring download every `frequency` seconds.
    ///
    /// Never starts a pass; recurring downloads begin with the next pass the
    /// owner triggers (e.g. `renew_recurring_downloads` or `dispatch_downloads`).
    pub async fn recurring_download(
        &self,
        url: &str,
        frequency: i64,
        request: &DownloadRequest,
    ) -> Result<Option<Download>> {
        anyhow::ensure!(frequency > 0, "frequency must be positive, got {}", frequency);
        let rows = self
            .intake(&[url.to_string()], request, Some(frequency))
            .await?;
        Ok(rows.into_iter().next())
    }

    pub(super) async fn intake(
        &self,
        urls: &[String],
        request: &DownloadRequest,
        frequency: Option<i64>,
    ) -> Result<Vec<Download>> {
        let mut new_downloads = Vec::with_capacity(urls.len());
        for url in urls {
            if self.db().skip_list_contains(url).await? {
                tracing::info!(url = %url, "not downloading URL on skip list");
                continue;
            }
            let (downloader, info_json) = match &request.downloader {
                Some(name) => (name.clone(), None),
                None => {
                    let (d, info) = self.registry().resolve(url).await?;
                    (d.name().to_string(), info)
                }
            };
            new_downloads.push(NewDownload {
                url: url.clone(),
                downloader: Some(downloader),
                sub_downloader: request.sub_downloader.clone(),
                frequency,
                reset_attempts: request.reset_attempts,
                destination: request.destination.clone(),
                settings: request.settings.clone(),
                info_json,
            });
        }
        let rows = self.db().create_or_renew(&new_downloads).await?;
        tracing::debug!(requested = urls.len(), stored = rows.len(), recurring = frequency.is_some(), "downloads created");
        Ok(rows)
    }
}
