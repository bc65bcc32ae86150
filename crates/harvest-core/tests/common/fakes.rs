//! Downloaders with scripted behavior for exercising the scheduler.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use harvest_core::downloader::{DownloadError, DownloadResult, Downloader, UrlMatch};
use harvest_core::job_db::Download;

pub type Behavior = Box<dyn Fn(&Download) -> Result<DownloadResult, DownloadError> + Send + Sync>;

pub struct FakeDownloader {
    name: String,
    prefix: String,
    behavior: Behavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<i64>>,
    already: Vec<String>,
}

impl FakeDownloader {
    /// Matches URLs starting with `prefix`; `behavior` decides each attempt.
    pub fn new(
        name: &str,
        prefix: &str,
        behavior: impl Fn(&Download) -> Result<DownloadResult, DownloadError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            behavior: Box::new(behavior),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            already: Vec::new(),
        }
    }

    pub fn succeeding(name: &str, prefix: &str) -> Self {
        Self::new(name, prefix, |_| Ok(DownloadResult::succeeded(None)))
    }

    /// Sleep this long inside every `do_download`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// URLs reported by `already_downloaded`.
    pub fn with_already_downloaded(mut self, urls: &[&str]) -> Self {
        self.already = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Download ids in the order they were attempted.
    pub fn seen(&self) -> Vec<i64> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn valid_url(&self, url: &str) -> anyhow::Result<UrlMatch> {
        Ok(if url.starts_with(&self.prefix) {
            UrlMatch::yes()
        } else {
            UrlMatch::no()
        })
    }

    async fn do_download(&self, download: &Download) -> Result<DownloadResult, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(download.id);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.behavior)(download)
    }

    async fn already_downloaded(&self, urls: &[String]) -> anyhow::Result<Vec<String>> {
        Ok(urls
            .iter()
            .filter(|u| self.already.contains(u))
            .cloned()
            .collect())
    }
}
