//! CLI for the harvest download manager.

mod commands;
mod control_socket;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harvest_core::config;
use harvest_core::downloader::build_default_registry;
use harvest_core::job_db::JobDb;
use harvest_core::scheduler::{DownloadManager, ManagerSettings};
use std::path::PathBuf;
use std::sync::Arc;

use commands::{
    run_add, run_daemon, run_delete_completed, run_delete_failed, run_disable, run_downloaders,
    run_enable, run_kill, run_recurring, run_remove, run_restart, run_skip, run_status, run_stop,
};

/// Top-level CLI for the harvest download manager.
#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "harvest: scheduled, resumable downloads with pluggable downloaders", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue one or more URLs for a single download.
    Add {
        /// URLs to download.
        #[arg(required = true)]
        urls: Vec<String>,
        /// Downloader to use instead of probing by URL.
        #[arg(long)]
        downloader: Option<String>,
        /// Downloader for any URLs these downloads produce.
        #[arg(long)]
        sub_downloader: Option<String>,
        /// Directory to download into (default: config download_dir, then current directory).
        #[arg(long)]
        destination: Option<PathBuf>,
        /// Start the attempt count from zero if the URL was requested before.
        #[arg(long)]
        reset_attempts: bool,
    },

    /// Download a URL repeatedly.
    Recurring {
        url: String,
        /// Period between downloads, e.g. 90s, 30m, 12h, 7d.
        #[arg(long, value_parser = parse_every)]
        every: i64,
        #[arg(long)]
        downloader: Option<String>,
        #[arg(long)]
        sub_downloader: Option<String>,
        #[arg(long)]
        destination: Option<PathBuf>,
    },

    /// Run the scheduler daemon until interrupted.
    Run,

    /// Show status of all downloads.
    Status {
        /// Only once-downloads or only recurring downloads.
        #[arg(long, value_parser = ["all", "once", "recurring"], default_value = "all")]
        filter: String,
    },

    /// Stop a download; once-downloads are marked failed.
    Kill {
        id: i64,
    },

    /// Retry a download from zero attempts.
    Restart {
        id: i64,
    },

    /// Delete a download record.
    Remove {
        id: i64,
    },

    /// Cancel running downloads and defer them.
    Stop,

    /// Let the daemon start passes again.
    Enable,

    /// Stop the daemon from starting downloads.
    Disable,

    /// Delete failed once-downloads and never request their URLs again.
    DeleteFailed,

    /// Delete completed once-downloads.
    DeleteCompleted,

    /// Manage the URL skip list.
    Skip {
        #[command(subcommand)]
        action: SkipAction,
    },

    /// List registered downloaders in lookup order.
    Downloaders,
}

#[derive(Debug, Subcommand)]
pub enum SkipAction {
    Add { url: String },
    Remove { url: String },
    List,
}

/// Parse `90s`, `30m`, `12h`, `7d` or plain seconds into seconds.
pub fn parse_every(s: &str) -> Result<i64, String> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => s.split_at(i),
        None => (s, "s"),
    };
    let n: i64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {s}"))?;
    let mult = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => return Err(format!("unknown duration unit in {s} (use s, m, h, d or w)")),
    };
    match n.checked_mul(mult) {
        Some(secs) if secs > 0 => Ok(secs),
        _ => Err(format!("duration must be positive: {s}")),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        let fallback_dir = std::env::current_dir().context("current directory")?;
        let registry = build_default_registry(&cfg, Some(fallback_dir))?;
        let db = JobDb::open_default().await?;
        let manager = DownloadManager::new(
            db,
            Arc::new(registry),
            ManagerSettings::from_config(&cfg),
        );
        // Only the daemon downloads; other commands record changes and poke it.
        if !matches!(cli.command, CliCommand::Run) {
            manager.disable();
        }

        match cli.command {
            CliCommand::Add {
                urls,
                downloader,
                sub_downloader,
                destination,
                reset_attempts,
            } => {
                run_add(
                    &manager,
                    &urls,
                    downloader,
                    sub_downloader,
                    destination,
                    reset_attempts,
                )
                .await?
            }
            CliCommand::Recurring {
                url,
                every,
                downloader,
                sub_downloader,
                destination,
            } => {
                run_recurring(&manager, &url, every, downloader, sub_downloader, destination)
                    .await?
            }
            CliCommand::Run => run_daemon(&manager, &cfg).await?,
            CliCommand::Status { filter } => run_status(&manager, &filter).await?,
            CliCommand::Kill { id } => run_kill(&manager, id).await?,
            CliCommand::Restart { id } => run_restart(&manager, id).await?,
            CliCommand::Remove { id } => run_remove(&manager, id).await?,
            CliCommand::Stop => run_stop(&manager).await?,
            CliCommand::Enable => run_enable().await?,
            CliCommand::Disable => run_disable().await?,
            CliCommand::DeleteFailed => run_delete_failed(&manager).await?,
            CliCommand::DeleteCompleted => run_delete_completed(&manager).await?,
            CliCommand::Skip { action } => run_skip(&manager, action).await?,
            CliCommand::Downloaders => run_downloaders(&manager),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
