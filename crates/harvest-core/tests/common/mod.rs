#![allow(dead_code)]

pub mod fakes;
pub mod file_server;

use std::sync::Arc;

use harvest_core::downloader::DownloaderRegistry;
use harvest_core::job_db::JobDb;
use harvest_core::scheduler::{DownloadManager, ManagerSettings};
use tempfile::TempDir;

/// Manager over a fresh on-disk database in a temp dir. Keep the `TempDir` alive.
pub async fn manager(registry: DownloaderRegistry) -> (DownloadManager, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = JobDb::open_at(dir.path().join("downloads.db")).await.unwrap();
    let settings = ManagerSettings {
        eager_passes: true,
        ..ManagerSettings::default()
    };
    (DownloadManager::new(db, Arc::new(registry), settings), dir)
}

pub fn registry_of(downloaders: Vec<Arc<fakes::FakeDownloader>>) -> DownloaderRegistry {
    let mut registry = DownloaderRegistry::new();
    for d in downloaders {
        registry.register(d).unwrap();
    }
    registry
}
