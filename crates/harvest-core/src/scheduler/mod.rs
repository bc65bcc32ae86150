//! Download scheduler.
//!
//! `DownloadManager` owns job intake, the scheduling pass (drain loop), retry
//! and recurring-slot policy, and the administrative operations an owning
//! service (CLI daemon, web API, cron) calls as plain functions.

mod admin;
mod finish;
mod intake;
mod pass;
#[cfg(test)]
mod tests;

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::HarvestConfig;
use crate::downloader::DownloaderRegistry;
use crate::job_db::JobDb;
use crate::retry::BackoffPolicy;

pub use intake::DownloadRequest;
pub use pass::PassReport;

/// Tunables for a `DownloadManager`.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Run passes inline on intake (tests, one-shot tools) instead of in a background task.
    pub eager_passes: bool,
    /// Age in seconds after which finished once-downloads are swept.
    pub retention_secs: i64,
    pub backoff: BackoffPolicy,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from_config(&HarvestConfig::default())
    }
}

impl ManagerSettings {
    pub fn from_config(cfg: &HarvestConfig) -> Self {
        Self {
            eager_passes: cfg.eager_passes,
            retention_secs: cfg.retention_secs(),
            backoff: BackoffPolicy::default(),
        }
    }
}

struct Inner {
    db: JobDb,
    registry: Arc<DownloaderRegistry>,
    settings: ManagerSettings,
    disabled: AtomicBool,
    /// Held for the duration of a pass; a second pass that can't take it is a no-op.
    pass_lock: tokio::sync::Mutex<()>,
}

/// Cheap to clone; clones share the database, registry and pass lock.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

impl DownloadManager {
    pub fn new(db: JobDb, registry: Arc<DownloaderRegistry>, settings: ManagerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                registry,
                settings,
                disabled: AtomicBool::new(false),
                pass_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn db(&self) -> &JobDb {
        &self.inner.db
    }

    pub fn registry(&self) -> &DownloaderRegistry {
        &self.inner.registry
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::SeqCst)
    }

    /// True while a scheduling pass holds the pass lock.
    pub fn is_pass_running(&self) -> bool {
        self.inner.pass_lock.try_lock().is_err()
    }

    /// Start a pass: inline when `eager_passes`, otherwise on a background task
    /// whose errors are logged.
    pub(crate) async fn trigger_pass(&self) -> Result<()> {
        if self.inner.settings.eager_passes {
            self.dispatch_downloads().await?;
            return Ok(());
        }
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.dispatch_downloads().await {
                tracing::error!("scheduling pass failed: {:#}", e);
            }
        });
        Ok(())
    }
}
