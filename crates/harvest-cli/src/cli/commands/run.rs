//! `harvest run` – the scheduler daemon.
//!
//! Recovers interrupted downloads, listens on the control socket, and on every
//! tick renews due recurring and deferred downloads and runs a pass. Old
//! once-downloads are swept once a day. Ctrl-C kills running downloads and exits.

use anyhow::Result;
use harvest_core::config::HarvestConfig;
use harvest_core::scheduler::DownloadManager;
use std::time::{Duration, Instant};

use crate::cli::control_socket;

const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn tick(manager: &DownloadManager) -> Result<()> {
    manager.renew_recurring_downloads().await?;
    manager.renew_deferred_downloads().await?;
    let report = manager.dispatch_downloads().await?;
    if report.processed > 0 || report.skipped > 0 {
        tracing::info!(
            processed = report.processed,
            completed = report.completed,
            deferred = report.deferred,
            failed = report.failed,
            skipped = report.skipped,
            "pass finished"
        );
    }
    Ok(())
}

pub async fn run_daemon(manager: &DownloadManager, cfg: &HarvestConfig) -> Result<()> {
    let recovered = manager.reset_downloads().await?;
    if recovered > 0 {
        println!("Recovered {recovered} interrupted download(s)");
    }
    let names = manager.registry().names().join(", ");
    println!("harvest daemon running (downloaders: {names}); Ctrl-C to stop");

    let socket_path = harvest_core::control::default_control_socket_path().ok();
    let listener = match &socket_path {
        Some(path) => match control_socket::spawn_control_listener(manager.clone(), path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket unavailable: {:#}", e);
                None
            }
        },
        None => None,
    };

    let mut interval = tokio::time::interval(cfg.renew_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_sweep: Option<Instant> = None;
    let mut running: Option<tokio::task::JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if running.as_ref().is_some_and(|h| !h.is_finished()) {
                    continue;
                }
                if last_sweep.map_or(true, |t| t.elapsed() >= SWEEP_INTERVAL) {
                    if let Err(e) = manager.delete_old_once_downloads().await {
                        tracing::warn!("sweeping old downloads failed: {:#}", e);
                    }
                    last_sweep = Some(Instant::now());
                }
                // Off the select loop so Ctrl-C is seen while a download runs.
                let manager = manager.clone();
                running = Some(tokio::spawn(async move {
                    if let Err(e) = tick(&manager).await {
                        tracing::error!("scheduler tick failed: {:#}", e);
                    }
                }));
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping...");
                let stopped = manager.kill().await?;
                tracing::info!(deferred = stopped, "daemon interrupted");
                if let Some(handle) = running.take() {
                    if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                        tracing::warn!("pass still running after kill; exiting anyway");
                    }
                }
                break;
            }
        }
    }

    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some(path) = socket_path {
        let _ = std::fs::remove_file(path);
    }
    Ok(())
}
