use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Built-in HTTP file downloader settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Register the `file` downloader at startup.
    pub enabled: bool,
    /// Lookup order among downloaders; lower is checked first.
    pub priority: u8,
    /// Connect timeout in seconds for each GET.
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 90,
            connect_timeout_secs: 30,
        }
    }
}

/// An external tool wrapped as a downloader (`[[commands]]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Unique downloader name stored on each job.
    pub name: String,
    /// Lookup order among downloaders; lower is checked first.
    #[serde(default = "default_command_priority")]
    pub priority: u8,
    /// URLs starting with any of these prefixes are handled by this tool.
    pub url_prefixes: Vec<String>,
    /// Executable to run.
    pub program: String,
    /// Arguments; `{url}` and `{dir}` are substituted per job.
    #[serde(default)]
    pub args: Vec<String>,
    /// Default timeout for one run, in seconds (None = unbounded).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_command_priority() -> u8 {
    50
}

/// Global configuration loaded from `~/.config/harvest/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Default destination directory for downloaders when a job has none.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Ceiling on any external process run, in seconds (None = unbounded).
    #[serde(default)]
    pub download_timeout_secs: Option<u64>,
    /// How often a running external process is checked for exit, kill or timeout.
    pub poll_interval_ms: u64,
    /// Daemon period between recurring renewals / scheduling passes.
    pub renew_interval_secs: u64,
    /// Completed once-downloads older than this are swept.
    pub retention_days: u64,
    /// Run scheduling passes inline on intake instead of in a background task.
    #[serde(default)]
    pub eager_passes: bool,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            download_timeout_secs: None,
            poll_interval_ms: 1000,
            renew_interval_secs: 60,
            retention_days: 30,
            eager_passes: false,
            http: HttpConfig::default(),
            commands: Vec::new(),
        }
    }
}

impl HarvestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn renew_interval(&self) -> Duration {
        Duration::from_secs(self.renew_interval_secs.max(1))
    }

    pub fn download_timeout(&self) -> Option<Duration> {
        self.download_timeout_secs.map(Duration::from_secs)
    }

    /// Retention horizon in seconds.
    pub fn retention_secs(&self) -> i64 {
        (self.retention_days as i64).saturating_mul(24 * 60 * 60)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("harvest")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HarvestConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HarvestConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HarvestConfig = toml::from_str(&data)?;
    Ok(cfg)
}
