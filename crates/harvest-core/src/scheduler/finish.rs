//! Applying an attempt's result to its download row.

use anyhow::Result;

use crate::downloader::Downloader;
use crate::job_db::{unix_timestamp, Download, DownloadStatus};
use crate::slots;

use super::intake::DownloadRequest;
use super::pass::{Attempt, AttemptOutcome};
use super::DownloadManager;

impl DownloadManager {
    /// Reload the row, record the result, enqueue children and apply the
    /// terminal transition. Returns the saved row, or None if it was deleted
    /// while the downloader ran.
    pub(super) async fn finish_download(
        &self,
        started: &Download,
        downloader: &dyn Downloader,
        attempt: Attempt,
    ) -> Result<Option<Download>> {
        let Some(mut download) = self.db().get_download(started.id).await? else {
            return Ok(None);
        };
        let Attempt { outcome, result } = attempt;

        if result.location.is_some() {
            download.location = result.location.clone();
        }
        if result.info_json.is_some() {
            download.info_json = result.info_json.clone();
        }

        if !result.downloads.is_empty() {
            self.enqueue_children(&download, &result.downloads, result.settings.clone())
                .await;
        }

        if download.status != DownloadStatus::Pending {
            // Changed underneath us (kill_download, stop); that decision and its error stand.
            tracing::info!(
                id = download.id,
                status = %download.status,
                "download changed while running; keeping its status"
            );
            self.db().save(&download).await?;
            return Ok(Some(download));
        }

        download.error = result.error.clone();
        let now = unix_timestamp();
        match outcome {
            AttemptOutcome::Success => {
                download.next_download = match download.frequency {
                    Some(freq) => Some(self.recurring_slot(&download, freq, now).await?),
                    None => None,
                };
                download.complete();
                tracing::info!(
                    id = download.id,
                    url = %download.url,
                    downloader = downloader.name(),
                    location = ?download.location,
                    "download complete"
                );
            }
            AttemptOutcome::Unrecoverable if !download.is_recurring() => {
                download.fail()?;
                tracing::info!(
                    id = download.id,
                    url = %download.url,
                    downloader = downloader.name(),
                    error = ?download.error,
                    "download failed"
                );
            }
            AttemptOutcome::Unrecoverable | AttemptOutcome::Transient => {
                if outcome == AttemptOutcome::Unrecoverable {
                    tracing::warn!(
                        id = download.id,
                        url = %download.url,
                        error = ?download.error,
                        "recurring download hit an unrecoverable error; retrying at backoff"
                    );
                }
                download.next_download = Some(self.settings().backoff.next_attempt_at(
                    now,
                    download.attempts,
                    download.frequency,
                ));
                download.defer();
                tracing::warn!(
                    id = download.id,
                    url = %download.url,
                    downloader = downloader.name(),
                    attempts = download.attempts,
                    next_download = ?download.next_download,
                    error = ?download.error,
                    "download deferred"
                );
            }
        }

        self.db().save(&download).await?;
        Ok(Some(download))
    }

    /// Slot in the next period for a recurring download, ranked within its cohort.
    async fn recurring_slot(&self, download: &Download, frequency: i64, now: i64) -> Result<i64> {
        let cohort = self.db().cohort_ids(frequency).await?;
        let rank = cohort
            .iter()
            .position(|id| *id == download.id)
            .unwrap_or(cohort.len());
        let len = cohort.len().max(rank + 1);
        Ok(slots::next_slot(now, frequency, rank, len))
    }

    /// Create rows for the child URLs a download produced.
    ///
    /// Children use the parent's `sub_downloader` and destination. Failures are
    /// logged; they never change the parent's outcome.
    async fn enqueue_children(
        &self,
        parent: &Download,
        urls: &[String],
        settings: Option<serde_json::Value>,
    ) {
        let mut urls: Vec<String> = urls.to_vec();
        urls.sort();
        urls.dedup();

        if let Some(sub) = parent
            .sub_downloader
            .as_deref()
            .and_then(|name| self.registry().by_name(name))
        {
            match sub.already_downloaded(&urls).await {
                Ok(done) if !done.is_empty() => {
                    tracing::debug!(id = parent.id, count = done.len(), "children already downloaded");
                    urls.retain(|u| !done.contains(u));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(id = parent.id, "already_downloaded check failed: {:#}", e);
                }
            }
        }

        let request = DownloadRequest {
            downloader: parent.sub_downloader.clone(),
            sub_downloader: None,
            reset_attempts: false,
            skip_download: true,
            destination: parent.destination.clone(),
            settings,
        };

        // One at a time so a child no downloader accepts doesn't drop its siblings.
        let mut created = 0;
        for url in &urls {
            match self.intake(std::slice::from_ref(url), &request, None).await {
                Ok(rows) => created += rows.len(),
                Err(e) => {
                    tracing::warn!(id = parent.id, url = %url, "could not enqueue child download: {:#}", e);
                }
            }
        }
        tracing::debug!(id = parent.id, requested = urls.len(), created, "child downloads enqueued");
    }
}
