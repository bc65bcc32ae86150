//! Downloader plugins: the capability providers the scheduler dispatches to.
//!
//! A downloader recognises URLs (`valid_url`) and fetches them (`do_download`).
//! The scheduler only depends on the `Downloader` trait; content-specific
//! fetch logic lives in implementations such as `HttpDownloader` and
//! `CommandDownloader`.

mod command;
mod http;
mod registry;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::control::KillSwitch;
use crate::job_db::Download;

pub use command::CommandDownloader;
pub use http::{derive_filename, HttpDownloader};
pub use registry::{build_default_registry, DownloaderRegistry, DuplicateDownloader, InvalidDownload};

/// Default lookup priority (0..=100, lower is checked first).
pub const DEFAULT_PRIORITY: u8 = 50;

/// Answer of `Downloader::valid_url`: whether the URL is handled, plus any
/// discovery data gathered while probing so the caller can reuse it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlMatch {
    pub matches: bool,
    pub info_json: Option<Value>,
}

impl UrlMatch {
    pub fn yes() -> Self {
        Self {
            matches: true,
            info_json: None,
        }
    }

    pub fn no() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, info_json: Value) -> Self {
        self.info_json = Some(info_json);
        self
    }
}

/// Outcome of one `do_download` call.
///
/// `success == false` without an error return is a transient failure.
/// `downloads` are child URLs the scheduler enqueues with the parent's sub-downloader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadResult {
    pub success: bool,
    pub error: Option<String>,
    pub location: Option<String>,
    pub downloads: Vec<String>,
    pub settings: Option<Value>,
    pub info_json: Option<Value>,
}

impl DownloadResult {
    pub fn succeeded(location: Option<String>) -> Self {
        Self {
            success: true,
            location,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_downloads(mut self, downloads: Vec<String>) -> Self {
        self.downloads = downloads;
        self
    }
}

/// Error returned by `Downloader::do_download`.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The target can never succeed (gone, forbidden, wrong content type).
    #[error("{0}")]
    Unrecoverable(String),
    /// Anything else; the download is deferred and retried with backoff.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// A named, prioritized capability provider.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Unique name, stored on each download row.
    fn name(&self) -> &str;

    /// Lookup order; lower is checked first, ties keep registration order.
    fn priority(&self) -> u8 {
        DEFAULT_PRIORITY
    }

    /// Default timeout for one download, if any.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Does this downloader handle `url`? May do a cheap remote check.
    async fn valid_url(&self, url: &str) -> anyhow::Result<UrlMatch>;

    /// Perform the actual fetch.
    async fn do_download(&self, download: &Download) -> Result<DownloadResult, DownloadError>;

    /// Subset of `urls` already satisfied; used to de-duplicate children before enqueueing.
    async fn already_downloaded(&self, _urls: &[String]) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Kill flag for downloaders that run external processes.
    fn kill_switch(&self) -> Option<&KillSwitch> {
        None
    }
}

/// Per-download timeout override from the `settings` payload (`{"timeout_secs": N}`).
pub fn settings_timeout(download: &Download) -> Option<Duration> {
    download
        .settings
        .as_ref()
        .and_then(|s| s.get("timeout_secs"))
        .and_then(Value::as_u64)
        .map(Duration::from_secs)
}
