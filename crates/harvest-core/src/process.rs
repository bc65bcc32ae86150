//! Supervise one external command: capture output, enforce a timeout and honour
//! the owning downloader's kill switch.
//!
//! The child is polled on a short fixed interval instead of awaited outright so
//! a timeout or kill request is observed within one interval.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::control::KillSwitch;

/// Why the child stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited,
    TimedOut,
    Killed,
}

/// Exit status and whatever output was captured before the child stopped.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// None when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub termination: Termination,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited && self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Smallest of the configured limits; `None` everywhere means unbounded.
pub fn effective_timeout(
    call_site: Option<Duration>,
    downloader_default: Option<Duration>,
    ceiling: Option<Duration>,
) -> Option<Duration> {
    [call_site, downloader_default, ceiling]
        .into_iter()
        .flatten()
        .min()
}

/// Runs external commands on behalf of one downloader.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    downloader: String,
    default_timeout: Option<Duration>,
    ceiling: Option<Duration>,
    poll_interval: Duration,
    kill: KillSwitch,
}

impl ProcessRunner {
    pub fn new(downloader: impl Into<String>) -> Self {
        Self {
            downloader: downloader.into(),
            default_timeout: None,
            ceiling: None,
            poll_interval: Duration::from_secs(1),
            kill: KillSwitch::new(),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Global ceiling from config; applies on top of every other limit.
    pub fn with_ceiling(mut self, ceiling: Option<Duration>) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(10));
        self
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill
    }

    /// Run `command` (program followed by arguments) in `workdir`.
    ///
    /// Returns an error only if the process cannot be spawned or waited on; a
    /// timeout or kill still yields the output captured so far.
    pub async fn run(
        &self,
        url: &str,
        command: &[String],
        workdir: &Path,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput> {
        let (program, args) = command.split_first().context("empty command")?;
        let timeout = effective_timeout(timeout, self.default_timeout, self.ceiling);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {} in {}", program, workdir.display()))?;
        tracing::info!(
            downloader = %self.downloader,
            url,
            pid = child.id(),
            timeout_secs = timeout.map(|t| t.as_secs()),
            "started {}",
            program
        );

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|s| tokio::spawn(capture(s, Arc::clone(&stdout_buf)))),
            child
                .stderr
                .take()
                .map(|s| tokio::spawn(capture(s, Arc::clone(&stderr_buf)))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let started = Instant::now();
        let (termination, status) = loop {
            let wait = match timeout {
                Some(limit) => limit
                    .saturating_sub(started.elapsed())
                    .min(self.poll_interval),
                None => self.poll_interval,
            };
            if let Ok(status) = tokio::time::timeout(wait, child.wait()).await {
                break (Termination::Exited, Some(status.context("wait for child")?));
            }
            let reason = if self.kill.take() {
                Some(Termination::Killed)
            } else if timeout.is_some_and(|limit| started.elapsed() >= limit) {
                Some(Termination::TimedOut)
            } else {
                None
            };
            if let Some(reason) = reason {
                tracing::warn!(downloader = %self.downloader, url, ?reason, "terminating {}", program);
                terminate(&mut child);
                break (reason, child.wait().await.ok());
            }
        };

        // Descendants may keep the pipes open after the child is gone; don't wait on them forever.
        let grace = self.poll_interval.saturating_mul(2).max(Duration::from_secs(1));
        for mut reader in readers {
            if tokio::time::timeout(grace, &mut reader).await.is_err() {
                reader.abort();
            }
        }

        let output = ProcessOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout: take_buffer(&stdout_buf),
            stderr: take_buffer(&stderr_buf),
            termination,
        };
        tracing::debug!(
            downloader = %self.downloader,
            url,
            exit_code = output.exit_code,
            ?termination,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "{} finished",
            program
        );
        Ok(output)
    }
}

async fn capture<R: AsyncRead + Unpin>(mut reader: R, buf: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(&chunk[..n]),
        }
    }
}

fn take_buffer(buf: &Arc<Mutex<Vec<u8>>>) -> Vec<u8> {
    std::mem::take(&mut *buf.lock().unwrap_or_else(|e| e.into_inner()))
}

/// Kill the child and, on unix, the process group it leads.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // The child was spawned as its own group leader, so -pid targets the whole group.
        let r = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
        if r != 0 {
            tracing::debug!(pid, "killpg failed: {}", std::io::Error::last_os_error());
        }
    }
    if let Err(e) = child.start_kill() {
        tracing::debug!("start_kill: {}", e);
    }
}
