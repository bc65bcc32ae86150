//! Built-in `file` downloader: single HTTP(S) GET of the URL into the
//! destination directory.

use anyhow::Context;
use async_trait::async_trait;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::HttpConfig;
use crate::job_db::Download;
use crate::retry::{classify_curl_error, classify_http_status, Outcome};

use super::{DownloadError, DownloadResult, Downloader, UrlMatch};

pub struct HttpDownloader {
    priority: u8,
    connect_timeout: Duration,
    default_dir: Option<PathBuf>,
}

impl HttpDownloader {
    pub fn new(cfg: &HttpConfig, default_dir: Option<PathBuf>) -> Self {
        Self {
            priority: cfg.priority,
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            default_dir,
        }
    }
}

/// Filename for a URL: the last non-empty path segment, sanitized, or `download.bin`.
pub fn derive_filename(url: &str) -> String {
    let candidate = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segs| segs.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_default();
    let sanitized: String = candidate
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = sanitized.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "download.bin".to_string()
    } else {
        trimmed.to_string()
    }
}

fn to_download_error(outcome: Outcome, msg: String) -> DownloadError {
    match outcome {
        Outcome::Unrecoverable => DownloadError::Unrecoverable(msg),
        Outcome::Transient => DownloadError::Failed(anyhow::anyhow!(msg)),
    }
}

/// Blocking GET into `<final_path>.part`, renamed on success. Returns bytes written.
fn fetch_to_file(
    url: &str,
    final_path: &Path,
    connect_timeout: Duration,
) -> Result<u64, DownloadError> {
    let part_path = final_path.with_extension(match final_path.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    });
    let mut file = File::create(&part_path)
        .with_context(|| format!("create {}", part_path.display()))?;
    let mut written = 0u64;

    let mut easy = curl::easy::Easy::new();
    let curl_err = |e: curl::Error| to_download_error(classify_curl_error(&e), format!("GET {}: {}", url, e));
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(10).map_err(curl_err)?;
    easy.connect_timeout(connect_timeout).map_err(curl_err)?;
    easy.low_speed_limit(1024).map_err(curl_err)?;
    easy.low_speed_time(Duration::from_secs(60)).map_err(curl_err)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| match file.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    tracing::warn!("write failed: {}", e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(curl_err)?;
        transfer.perform()
    };
    if let Err(e) = performed {
        let _ = std::fs::remove_file(&part_path);
        return Err(curl_err(e));
    }

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        let _ = std::fs::remove_file(&part_path);
        return Err(to_download_error(
            classify_http_status(code),
            format!("GET {} returned HTTP {}", url, code),
        ));
    }

    file.sync_all().context("sync downloaded file")?;
    std::fs::rename(&part_path, final_path)
        .with_context(|| format!("rename {} -> {}", part_path.display(), final_path.display()))?;
    Ok(written)
}

#[async_trait]
impl Downloader for HttpDownloader {
    fn name(&self) -> &str {
        "file"
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn valid_url(&self, url: &str) -> anyhow::Result<UrlMatch> {
        let matches = url::Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        Ok(if matches { UrlMatch::yes() } else { UrlMatch::no() })
    }

    async fn do_download(&self, download: &Download) -> Result<DownloadResult, DownloadError> {
        let dir = download
            .destination_dir()
            .map(PathBuf::from)
            .or_else(|| self.default_dir.clone())
            .context("no destination directory for download")?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;
        let final_path = dir.join(derive_filename(&download.url));

        let url = download.url.clone();
        let path = final_path.clone();
        let connect_timeout = self.connect_timeout;
        let written = tokio::task::spawn_blocking(move || fetch_to_file(&url, &path, connect_timeout))
            .await
            .map_err(|e| DownloadError::Failed(anyhow::anyhow!("download task join: {}", e)))??;

        tracing::info!(url = %download.url, bytes = written, path = %final_path.display(), "file downloaded");
        Ok(DownloadResult::succeeded(Some(
            final_path.to_string_lossy().into_owned(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_filename_uses_last_segment() {
        assert_eq!(derive_filename("https://example.com/a/b/file.iso"), "file.iso");
        assert_eq!(derive_filename("https://example.com/dir/"), "dir");
        assert_eq!(derive_filename("https://example.com/x?y=1"), "x");
    }

    #[test]
    fn derive_filename_falls_back() {
        assert_eq!(derive_filename("https://example.com/"), "download.bin");
        assert_eq!(derive_filename("not a url"), "download.bin");
        assert_eq!(derive_filename("https://example.com/.."), "download.bin");
    }

    #[tokio::test]
    async fn matches_http_schemes_only() {
        let d = HttpDownloader::new(&HttpConfig::default(), None);
        assert!(d.valid_url("https://example.com/a").await.unwrap().matches);
        assert!(d.valid_url("http://example.com/a").await.unwrap().matches);
        assert!(!d.valid_url("ftp://example.com/a").await.unwrap().matches);
        assert!(!d.valid_url("nonsense").await.unwrap().matches);
    }

    #[tokio::test]
    async fn missing_destination_is_transient() {
        let d = HttpDownloader::new(&HttpConfig::default(), None);
        let download = Download {
            id: 1,
            url: "https://example.com/a".to_string(),
            status: crate::job_db::DownloadStatus::Pending,
            attempts: 1,
            frequency: None,
            next_download: None,
            last_successful_download: None,
            downloader: Some("file".to_string()),
            sub_downloader: None,
            error: None,
            location: None,
            destination: None,
            settings: None,
            info_json: None,
            created_at: 0,
            updated_at: 0,
        };
        assert!(matches!(
            d.do_download(&download).await,
            Err(DownloadError::Failed(_))
        ));
    }
}
