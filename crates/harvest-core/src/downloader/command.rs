//! Downloader that wraps an external tool configured in `[[commands]]`.

use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{CommandConfig, HarvestConfig};
use crate::control::KillSwitch;
use crate::job_db::Download;
use crate::process::{ProcessRunner, Termination};

use super::{settings_timeout, DownloadError, DownloadResult, Downloader, UrlMatch};

/// Keep stored errors readable; tools can be chatty on stderr.
const MAX_ERROR_CHARS: usize = 2000;

pub struct CommandDownloader {
    cfg: CommandConfig,
    default_dir: Option<PathBuf>,
    runner: ProcessRunner,
}

impl CommandDownloader {
    pub fn new(cfg: CommandConfig, default_dir: Option<PathBuf>, global: &HarvestConfig) -> Self {
        let runner = ProcessRunner::new(cfg.name.clone())
            .with_default_timeout(cfg.timeout_secs.map(Duration::from_secs))
            .with_ceiling(global.download_timeout())
            .with_poll_interval(global.poll_interval());
        Self {
            cfg,
            default_dir,
            runner,
        }
    }

    /// Program followed by arguments with `{url}` / `{dir}` substituted.
    fn command_line(&self, url: &str, dir: &str) -> Vec<String> {
        std::iter::once(self.cfg.program.clone())
            .chain(
                self.cfg
                    .args
                    .iter()
                    .map(|a| a.replace("{url}", url).replace("{dir}", dir)),
            )
            .collect()
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}

#[async_trait]
impl Downloader for CommandDownloader {
    fn name(&self) -> &str {
        &self.cfg.name
    }

    fn priority(&self) -> u8 {
        self.cfg.priority
    }

    fn timeout(&self) -> Option<Duration> {
        self.runner.default_timeout()
    }

    async fn valid_url(&self, url: &str) -> anyhow::Result<UrlMatch> {
        let matches = self.cfg.url_prefixes.iter().any(|p| url.starts_with(p.as_str()));
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

        let command = self.command_line(&download.url, &dir.to_string_lossy());
        let output = self
            .runner
            .run(&download.url, &command, &dir, settings_timeout(download))
            .await?;

        if output.success() {
            return Ok(DownloadResult::succeeded(Some(
                dir.to_string_lossy().into_owned(),
            )));
        }
        let detail = tail(&output.stderr_lossy(), MAX_ERROR_CHARS);
        let summary = match output.termination {
            Termination::TimedOut => format!("{} timed out", self.cfg.program),
            Termination::Killed => format!("{} was killed", self.cfg.program),
            Termination::Exited => format!(
                "{} exited with {}",
                self.cfg.program,
                output
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string())
            ),
        };
        let error = if detail.is_empty() {
            summary
        } else {
            format!("{}: {}", summary, detail)
        };
        Ok(DownloadResult::failed(error))
    }

    fn kill_switch(&self) -> Option<&KillSwitch> {
        Some(self.runner.kill_switch())
    }
}
