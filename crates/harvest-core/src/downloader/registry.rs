//! Ordered collection of downloaders and URL-to-downloader resolution.

use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::HarvestConfig;

use super::{CommandDownloader, Downloader, HttpDownloader};

/// No registered downloader accepted the URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no downloader can handle {url}")]
pub struct InvalidDownload {
    pub url: String,
}

/// The same downloader instance, or another with the same name, was registered twice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("downloader {name} is already registered")]
pub struct DuplicateDownloader {
    pub name: String,
}

/// Downloaders sorted by priority (stable: equal priorities keep registration order).
///
/// Built once at startup and shared read-only with the scheduler.
#[derive(Default)]
pub struct DownloaderRegistry {
    downloaders: Vec<Arc<dyn Downloader>>,
}

fn same_instance(a: &Arc<dyn Downloader>, b: &Arc<dyn Downloader>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl DownloaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, downloader: Arc<dyn Downloader>) -> Result<(), DuplicateDownloader> {
        let duplicate = self
            .downloaders
            .iter()
            .any(|d| same_instance(d, &downloader) || d.name() == downloader.name());
        if duplicate {
            return Err(DuplicateDownloader {
                name: downloader.name().to_string(),
            });
        }
        tracing::debug!(
            downloader = downloader.name(),
            priority = downloader.priority(),
            "registered downloader"
        );
        self.downloaders.push(downloader);
        self.downloaders.sort_by_key(|d| d.priority());
        Ok(())
    }

    /// First downloader (in priority order) whose `valid_url` accepts `url`,
    /// with the discovery data it returned.
    ///
    /// A `valid_url` check that errors counts as "no match" so one broken plugin can't
    /// block resolution for the rest.
    pub async fn resolve(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn Downloader>, Option<Value>), InvalidDownload> {
        for downloader in &self.downloaders {
            match downloader.valid_url(url).await {
                Ok(m) if m.matches => {
                    tracing::debug!(url, downloader = downloader.name(), "resolved downloader");
                    return Ok((Arc::clone(downloader), m.info_json));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(url, downloader = downloader.name(), "valid_url check failed: {:#}", e);
                }
            }
        }
        Err(InvalidDownload {
            url: url.to_string(),
        })
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Downloader>> {
        self.downloaders.iter().find(|d| d.name() == name).cloned()
    }

    /// Names in lookup order.
    pub fn names(&self) -> Vec<&str> {
        self.downloaders.iter().map(|d| d.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Downloader>> {
        self.downloaders.iter()
    }

    pub fn len(&self) -> usize {
        self.downloaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloaders.is_empty()
    }

    /// Signal every downloader's in-flight external process to be killed.
    pub fn kill_all(&self) {
        for switch in self.downloaders.iter().filter_map(|d| d.kill_switch()) {
            switch.kill();
        }
    }

    /// Drop kill requests that no running process observed.
    pub fn clear_kills(&self) {
        for switch in self.downloaders.iter().filter_map(|d| d.kill_switch()) {
            switch.clear();
        }
    }
}

/// Registry with the built-in downloaders enabled in `cfg`.
///
/// `fallback_dir` is used as destination when neither the job nor the config names one.
pub fn build_default_registry(
    cfg: &HarvestConfig,
    fallback_dir: Option<PathBuf>,
) -> Result<DownloaderRegistry> {
    let default_dir = cfg.download_dir.clone().or(fallback_dir);
    let mut registry = DownloaderRegistry::new();
    for command in &cfg.commands {
        registry.register(Arc::new(CommandDownloader::new(
            command.clone(),
            default_dir.clone(),
            cfg,
        )))?;
    }
    if cfg.http.enabled {
        registry.register(Arc::new(HttpDownloader::new(&cfg.http, default_dir)))?;
    }
    Ok(registry)
}
