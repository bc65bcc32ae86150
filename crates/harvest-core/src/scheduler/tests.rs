//! Manager tests against an in-memory database and scripted downloaders.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::control::KillSwitch;
use crate::downloader::{
    DownloadError, DownloadResult, Downloader, DownloaderRegistry, InvalidDownload, UrlMatch,
};
use crate::job_db::{unix_timestamp, Download, DownloadFilter, DownloadStatus, JobDb};

use super::{DownloadManager, DownloadRequest, ManagerSettings};

#[derive(Clone, Copy)]
enum Script {
    Succeed,
    Fail,
    Unrecoverable,
    Panic,
}

struct Scripted {
    name: &'static str,
    script: Script,
    calls: AtomicUsize,
    kill: KillSwitch,
}

impl Scripted {
    fn new(name: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            calls: AtomicUsize::new(0),
            kill: KillSwitch::new(),
        })
    }
}

#[async_trait]
impl Downloader for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    async fn valid_url(&self, url: &str) -> anyhow::Result<UrlMatch> {
        Ok(if url.starts_with("https://") {
            UrlMatch::yes()
        } else {
            UrlMatch::no()
        })
    }

    async fn do_download(&self, _download: &Download) -> Result<DownloadResult, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Succeed => Ok(DownloadResult::succeeded(Some("/x".to_string()))),
            Script::Fail => Ok(DownloadResult::failed("try later")),
            Script::Unrecoverable => Err(DownloadError::Unrecoverable("gone".to_string())),
            Script::Panic => panic!("plugin bug"),
        }
    }

    fn kill_switch(&self) -> Option<&KillSwitch> {
        Some(&self.kill)
    }
}

async fn manager_with(downloader: Arc<Scripted>) -> DownloadManager {
    let db = JobDb::open_memory().await.unwrap();
    let mut registry = DownloaderRegistry::new();
    registry.register(downloader).unwrap();
    let settings = ManagerSettings {
        eager_passes: true,
        ..ManagerSettings::default()
    };
    DownloadManager::new(db, Arc::new(registry), settings)
}

#[tokio::test]
async fn eager_intake_runs_a_pass() {
    let fake = Scripted::new("fake", Script::Succeed);
    let manager = manager_with(fake.clone()).await;
    let d = manager
        .create_download("https://example.com/a", &DownloadRequest::default())
        .await
        .unwrap()
        .unwrap();
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::Complete);
    assert_eq!(d.downloader.as_deref(), Some("fake"));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn skip_download_only_persists() {
    let fake = Scripted::new("fake", Script::Succeed);
    let manager = manager_with(fake.clone()).await;
    let req = DownloadRequest {
        skip_download: true,
        ..Default::default()
    };
    let d = manager
        .create_download("https://example.com/a", &req)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(d.status, DownloadStatus::New);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unmatched_url_creates_nothing() {
    let manager = manager_with(Scripted::new("fake", Script::Succeed)).await;
    let urls = vec![
        "https://example.com/ok".to_string(),
        "ftp://example.com/nope".to_string(),
    ];
    let err = manager
        .create_downloads(&urls, &DownloadRequest::default())
        .await
        .unwrap_err();
    assert!(err.downcast_ref::<InvalidDownload>().is_some());
    assert!(manager
        .list_downloads(DownloadFilter::All)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn recurring_download_does_not_start_a_pass() {
    let fake = Scripted::new("fake", Script::Succeed);
    let manager = manager_with(fake.clone()).await;
    let d = manager
        .recurring_download("https://example.com/feed", 3600, &DownloadRequest::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(d.frequency, Some(3600));
    assert_eq!(d.status, DownloadStatus::New);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);

    assert!(manager
        .recurring_download("https://example.com/feed", 0, &DownloadRequest::default())
        .await
        .is_err());
}

#[tokio::test]
async fn panicking_downloader_is_deferred() {
    let manager = manager_with(Scripted::new("fake", Script::Panic)).await;
    let d = manager
        .create_download("https://example.com/a", &DownloadRequest::default())
        .await
        .unwrap()
        .unwrap();
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::Deferred);
    assert!(d.error.unwrap().contains("plugin bug"));
}

#[tokio::test]
async fn unrecoverable_recurring_is_deferred_within_frequency() {
    let manager = manager_with(Scripted::new("fake", Script::Unrecoverable)).await;
    let d = manager
        .recurring_download("https://example.com/feed", 3600, &DownloadRequest::default())
        .await
        .unwrap()
        .unwrap();
    let before = unix_timestamp();
    let report = manager.dispatch_downloads().await.unwrap();
    assert_eq!(report.deferred, 1);
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::Deferred);
    assert_eq!(d.error.as_deref(), Some("gone"));
    let next = d.next_download.unwrap();
    assert!(next >= before + 3600 && next <= unix_timestamp() + 3600);
}

#[tokio::test]
async fn disabled_manager_leaves_downloads_new() {
    let fake = Scripted::new("fake", Script::Succeed);
    let manager = manager_with(fake.clone()).await;
    manager.disable();
    let d = manager
        .create_download("https://example.com/a", &DownloadRequest::default())
        .await
        .unwrap()
        .unwrap();
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::New);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);

    manager.enable().await.unwrap();
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::Complete);
}

#[tokio::test]
async fn kill_download_fails_once_and_defers_recurring() {
    let manager = manager_with(Scripted::new("fake", Script::Succeed)).await;
    let req = DownloadRequest {
        skip_download: true,
        ..Default::default()
    };
    let once = manager
        .create_download("https://example.com/a", &req)
        .await
        .unwrap()
        .unwrap();
    let recurring = manager
        .recurring_download("https://example.com/feed", 600, &req)
        .await
        .unwrap()
        .unwrap();

    assert!(manager.kill_download(once.id).await.unwrap());
    assert!(manager.kill_download(recurring.id).await.unwrap());
    assert!(!manager.kill_download(9999).await.unwrap());

    let once = manager.get_download(once.id).await.unwrap().unwrap();
    assert_eq!(once.status, DownloadStatus::Failed);
    assert_eq!(once.error.as_deref(), Some("killed by user"));
    let recurring = manager.get_download(recurring.id).await.unwrap().unwrap();
    assert_eq!(recurring.status, DownloadStatus::Deferred);
    assert!(recurring.next_download.is_some());
}

#[tokio::test]
async fn kill_download_signals_running_downloader() {
    let fake = Scripted::new("fake", Script::Succeed);
    let manager = manager_with(fake.clone()).await;
    let req = DownloadRequest {
        skip_download: true,
        ..Default::default()
    };
    let mut d = manager
        .create_download("https://example.com/a", &req)
        .await
        .unwrap()
        .unwrap();
    d.started();
    manager.db().save(&d).await.unwrap();

    assert!(manager.kill_download(d.id).await.unwrap());
    assert!(fake.kill.is_set());
}

#[tokio::test]
async fn stop_defers_pending_and_kills() {
    let fake = Scripted::new("fake", Script::Succeed);
    let manager = manager_with(fake.clone()).await;
    let req = DownloadRequest {
        skip_download: true,
        ..Default::default()
    };
    let mut d = manager
        .create_download("https://example.com/a", &req)
        .await
        .unwrap()
        .unwrap();
    d.started();
    manager.db().save(&d).await.unwrap();

    assert_eq!(manager.kill().await.unwrap(), 1);
    assert!(manager.is_disabled());
    assert!(fake.kill.is_set());
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::Deferred);
    let delay = d.next_download.unwrap() - unix_timestamp();
    assert!((3 * 3600 - 5..=3 * 3600).contains(&delay));
}

#[tokio::test]
async fn restart_and_retry_renew_downloads() {
    let fake = Scripted::new("fake", Script::Fail);
    let manager = manager_with(fake.clone()).await;
    let d = manager
        .create_download("https://example.com/a", &DownloadRequest::default())
        .await
        .unwrap()
        .unwrap();
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::Deferred);
    assert_eq!(d.attempts, 1);

    assert_eq!(manager.retry_downloads().await.unwrap(), 1);
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.attempts, 2);

    assert!(manager.restart_download(d.id).await.unwrap());
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.attempts, 1);
    assert_eq!(d.status, DownloadStatus::Deferred);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
    assert!(!manager.restart_download(9999).await.unwrap());
}

#[tokio::test]
async fn reset_downloads_recovers_interrupted_rows() {
    let manager = manager_with(Scripted::new("fake", Script::Succeed)).await;
    let req = DownloadRequest {
        skip_download: true,
        ..Default::default()
    };
    let mut d = manager
        .create_download("https://example.com/a", &req)
        .await
        .unwrap()
        .unwrap();
    d.started();
    manager.db().save(&d).await.unwrap();

    assert_eq!(manager.reset_downloads().await.unwrap(), 1);
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::New);
}

#[tokio::test]
async fn delete_completed_allows_request_again() {
    let manager = manager_with(Scripted::new("fake", Script::Succeed)).await;
    manager
        .create_download("https://example.com/a", &DownloadRequest::default())
        .await
        .unwrap();
    assert_eq!(manager.delete_completed().await.unwrap(), 1);
    assert!(!manager
        .db()
        .skip_list_contains("https://example.com/a")
        .await
        .unwrap());
    let again = manager
        .create_download("https://example.com/a", &DownloadRequest::default())
        .await
        .unwrap();
    assert!(again.is_some());
}

#[tokio::test]
async fn old_once_downloads_are_swept() {
    let manager = manager_with(Scripted::new("fake", Script::Succeed)).await;
    let d = manager
        .create_download("https://example.com/a", &DownloadRequest::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(manager.delete_old_once_downloads().await.unwrap(), 0);

    let mut d = manager.get_download(d.id).await.unwrap().unwrap();
    d.last_successful_download = Some(unix_timestamp() - 31 * 24 * 3600);
    manager.db().save(&d).await.unwrap();
    assert_eq!(manager.delete_old_once_downloads().await.unwrap(), 1);
    assert!(manager.get_download(d.id).await.unwrap().is_none());
}

#[tokio::test]
async fn recurring_with_huge_frequency_completes() {
    let manager = manager_with(Scripted::new("fake", Script::Succeed)).await;
    let d = manager
        .recurring_download("https://example.com/feed", i64::MAX - 10, &DownloadRequest::default())
        .await
        .unwrap()
        .unwrap();
    let report = manager.dispatch_downloads().await.unwrap();
    assert_eq!(report.completed, 1);
    let d = manager.get_download(d.id).await.unwrap().unwrap();
    assert_eq!(d.status, DownloadStatus::Complete);
    assert_eq!(d.next_download, Some(i64::MAX));
    assert_eq!(manager.renew_recurring_downloads().await.unwrap(), 0);
}
