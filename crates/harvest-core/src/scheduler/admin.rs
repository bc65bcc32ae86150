//! Administrative operations: lifecycle control, cleanup, per-download actions
//! and the read surface.

use anyhow::Result;
use std::sync::atomic::Ordering;

use crate::job_db::{unix_timestamp, Download, DownloadFilter, DownloadStatus, JobId, StatusCounts};

use super::DownloadManager;

impl DownloadManager {
    /// Put `pending` and `deferred` downloads back to `new`. Call once at
    /// startup to recover from a crash mid-pass.
    pub async fn reset_downloads(&self) -> Result<u64> {
        let n = self.db().reset_downloads().await?;
        if n > 0 {
            tracing::info!(count = n, "reset interrupted downloads");
        }
        Ok(n)
    }

    /// Renew recurring downloads whose `next_download` has passed and start a
    /// pass if any were renewed.
    pub async fn renew_recurring_downloads(&self) -> Result<u64> {
        let n = self.db().renew_due_recurring(unix_timestamp()).await?;
        if n > 0 {
            tracing::info!(count = n, "renewed recurring downloads");
            self.trigger_pass().await?;
        }
        Ok(n)
    }

    /// Renew once-downloads whose backoff has elapsed and start a pass if any were renewed.
    pub async fn renew_deferred_downloads(&self) -> Result<u64> {
        let n = self.db().renew_due_deferred(unix_timestamp()).await?;
        if n > 0 {
            tracing::info!(count = n, "retrying deferred downloads");
            self.trigger_pass().await?;
        }
        Ok(n)
    }

    /// Retry every deferred download now, ignoring backoff.
    pub async fn retry_downloads(&self) -> Result<u64> {
        let n = self.db().renew_deferred().await?;
        if n > 0 {
            self.trigger_pass().await?;
        }
        Ok(n)
    }

    /// Cancel running external processes and defer every `pending` download
    /// to its backoff.
    pub async fn stop(&self) -> Result<u64> {
        self.registry().kill_all();
        let now = unix_timestamp();
        let mut n = 0;
        for download in self.db().list_by_status(DownloadStatus::Pending).await? {
            let next = self.settings().backoff.next_attempt_at(
                now,
                download.attempts,
                download.frequency,
            );
            if self.db().defer_if_pending(download.id, next).await? {
                n += 1;
            }
        }
        tracing::info!(deferred = n, "downloads stopped");
        Ok(n)
    }

    /// Disable new passes, then `stop`.
    pub async fn kill(&self) -> Result<u64> {
        self.disable();
        self.stop().await
    }

    /// Allow passes again and start one.
    pub async fn enable(&self) -> Result<()> {
        self.inner.disabled.store(false, Ordering::SeqCst);
        self.registry().clear_kills();
        tracing::info!("downloads enabled");
        self.trigger_pass().await
    }

    /// Prevent passes from processing downloads. A running pass stops before its next download.
    pub fn disable(&self) {
        self.inner.disabled.store(true, Ordering::SeqCst);
        tracing::info!("downloads disabled");
    }

    /// Delete finished once-downloads older than the retention horizon.
    pub async fn delete_old_once_downloads(&self) -> Result<u64> {
        let cutoff = unix_timestamp() - self.settings().retention_secs;
        let n = self.db().delete_old_once(cutoff).await?;
        if n > 0 {
            tracing::info!(count = n, "deleted old once-downloads");
        }
        Ok(n)
    }

    /// Delete failed once-downloads and put their URLs on the skip list.
    pub async fn delete_failed(&self) -> Result<u64> {
        let n = self.db().delete_failed_once().await?;
        tracing::info!(count = n, "deleted failed downloads");
        Ok(n)
    }

    /// Delete completed once-downloads. Their URLs may be requested again.
    pub async fn delete_completed(&self) -> Result<u64> {
        let n = self.db().delete_completed_once().await?;
        tracing::info!(count = n, "deleted completed downloads");
        Ok(n)
    }

    /// Stop a single download.
    ///
    /// A once-download is failed with "killed by user"; a recurring one is
    /// deferred to its backoff instead. If it is running, its downloader's
    /// process is signalled. Returns false when no such download exists.
    pub async fn kill_download(&self, id: JobId) -> Result<bool> {
        let Some(mut download) = self.db().get_download(id).await? else {
            return Ok(false);
        };
        if download.status == DownloadStatus::Pending {
            if let Some(switch) = download
                .downloader
                .as_deref()
                .and_then(|name| self.registry().by_name(name))
                .and_then(|d| d.kill_switch().cloned())
            {
                switch.kill();
            }
        }
        download.error = Some("killed by user".to_string());
        if download.is_recurring() {
            download.next_download = Some(self.settings().backoff.next_attempt_at(
                unix_timestamp(),
                download.attempts,
                download.frequency,
            ));
            download.defer();
        } else {
            download.fail()?;
        }
        self.db().save(&download).await?;
        tracing::info!(id, url = %download.url, status = %download.status, "download killed");
        Ok(true)
    }

    /// Renew one download with its attempts zeroed and start a pass.
    /// Returns false when no such download exists.
    pub async fn restart_download(&self, id: JobId) -> Result<bool> {
        let Some(mut download) = self.db().get_download(id).await? else {
            return Ok(false);
        };
        download.renew(true);
        download.error = None;
        self.db().save(&download).await?;
        tracing::info!(id, url = %download.url, "download restarted");
        self.trigger_pass().await?;
        Ok(true)
    }

    pub async fn delete_download(&self, id: JobId) -> Result<bool> {
        self.db().delete_download(id).await
    }

    pub async fn get_download(&self, id: JobId) -> Result<Option<Download>> {
        self.db().get_download(id).await
    }

    pub async fn list_downloads(&self, filter: DownloadFilter) -> Result<Vec<Download>> {
        self.db().list_downloads(filter).await
    }

    pub async fn status_counts(&self) -> Result<StatusCounts> {
        self.db().status_counts().await
    }
}
