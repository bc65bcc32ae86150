//! The scheduling pass: drain every `new` download once, in id order.

use anyhow::Result;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::downloader::{DownloadError, DownloadResult, Downloader};
use crate::job_db::{unix_timestamp, Download, DownloadStatus, JobId};

use super::DownloadManager;

/// Summary of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Downloads handed to a downloader.
    pub processed: usize,
    pub completed: usize,
    pub deferred: usize,
    pub failed: usize,
    /// Rows deleted because their URL is on the skip list.
    pub skipped: usize,
    /// Another pass held the lock; nothing was done.
    pub busy: bool,
    /// Stopped early because the manager was disabled.
    pub aborted: bool,
}

/// How an attempt ended, before it is applied to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AttemptOutcome {
    Success,
    Transient,
    Unrecoverable,
}

pub(super) struct Attempt {
    pub outcome: AttemptOutcome,
    pub result: DownloadResult,
}

impl Attempt {
    fn from_call(call: std::thread::Result<Result<DownloadResult, DownloadError>>) -> Self {
        match call {
            Ok(Ok(result)) if result.success => Self {
                outcome: AttemptOutcome::Success,
                result,
            },
            Ok(Ok(result)) => Self {
                outcome: AttemptOutcome::Transient,
                result,
            },
            Ok(Err(DownloadError::Unrecoverable(msg))) => Self {
                outcome: AttemptOutcome::Unrecoverable,
                result: DownloadResult::failed(msg),
            },
            Ok(Err(DownloadError::Failed(e))) => Self {
                outcome: AttemptOutcome::Transient,
                result: DownloadResult::failed(format!("{:#}", e)),
            },
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Self {
                    outcome: AttemptOutcome::Transient,
                    result: DownloadResult::failed(format!("downloader panicked: {}", msg)),
                }
            }
        }
    }
}

impl DownloadManager {
    /// Run one scheduling pass.
    ///
    /// Processes every download that is `new` with an id no greater than the
    /// highest id present when the pass starts, strictly one at a time.
    /// Downloads created during the pass (including children) wait for the
    /// next pass. If another pass is already running this returns immediately
    /// with `busy` set.
    pub async fn dispatch_downloads(&self) -> Result<PassReport> {
        let Ok(_guard) = self.inner.pass_lock.try_lock() else {
            tracing::debug!("scheduling pass already running; skipping");
            return Ok(PassReport {
                busy: true,
                ..PassReport::default()
            });
        };

        // Kill requests from before this pass have no process left to observe them.
        self.registry().clear_kills();

        let mut report = PassReport::default();
        let high_water = self.db().max_download_id().await?;
        let mut cursor: JobId = 0;
        tracing::debug!(high_water, "scheduling pass started");

        while let Some(mut download) = self.db().next_new_download(cursor, high_water).await? {
            cursor = download.id;

            if self.is_disabled() {
                tracing::info!("downloads disabled; aborting pass");
                report.aborted = true;
                break;
            }

            if self.db().skip_list_contains(&download.url).await? {
                tracing::info!(id = download.id, url = %download.url, "URL on skip list; deleting download");
                self.db().delete_download(download.id).await?;
                report.skipped += 1;
                continue;
            }

            let downloader = match self.downloader_for(&download).await {
                Some(d) => d,
                None => {
                    // Nothing can handle this row anymore; park it like any transient failure.
                    tracing::warn!(id = download.id, url = %download.url, downloader = ?download.downloader, "no downloader available");
                    download.started();
                    download.error = Some(format!(
                        "no downloader available for {}",
                        download.downloader.as_deref().unwrap_or(&download.url)
                    ));
                    download.next_download = Some(self.settings().backoff.next_attempt_at(
                        unix_timestamp(),
                        download.attempts,
                        download.frequency,
                    ));
                    download.defer();
                    self.db().save(&download).await?;
                    report.deferred += 1;
                    continue;
                }
            };

            download.started();
            self.db().save(&download).await?;
            report.processed += 1;
            tracing::info!(
                id = download.id,
                url = %download.url,
                downloader = downloader.name(),
                attempt = download.attempts,
                "starting download"
            );

            let call = AssertUnwindSafe(downloader.do_download(&download))
                .catch_unwind()
                .await;
            let attempt = Attempt::from_call(call);

            match self.finish_download(&download, downloader.as_ref(), attempt).await? {
                Some(finished) => match finished.status {
                    DownloadStatus::Complete => report.completed += 1,
                    DownloadStatus::Failed => report.failed += 1,
                    DownloadStatus::Deferred => report.deferred += 1,
                    _ => {}
                },
                None => {
                    tracing::debug!(id = download.id, "download deleted while running");
                }
            }
        }

        tracing::debug!(?report, "scheduling pass finished");
        Ok(report)
    }

    /// Downloader stored on the row, or a fresh registry lookup when none is stored.
    async fn downloader_for(&self, download: &Download) -> Option<Arc<dyn Downloader>> {
        match &download.downloader {
            Some(name) => self.registry().by_name(name),
            None => self.registry().resolve(&download.url).await.ok().map(|(d, _)| d),
        }
    }
}
