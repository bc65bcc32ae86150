//! Types used by the download database.

use serde_json::Value;

/// Download (job) identifier.
pub type JobId = i64;

/// Status of a download, stored as a string in the database.
///
/// `new -> pending -> {complete | deferred | failed}`; `deferred` and recurring
/// `complete` rows re-enter `new` when renewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    New,
    Pending,
    Deferred,
    Failed,
    Complete,
}

impl DownloadStatus {
    pub const ALL: [DownloadStatus; 5] = [
        DownloadStatus::New,
        DownloadStatus::Pending,
        DownloadStatus::Deferred,
        DownloadStatus::Failed,
        DownloadStatus::Complete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::New => "new",
            DownloadStatus::Pending => "pending",
            DownloadStatus::Deferred => "deferred",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Complete => "complete",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "new" => DownloadStatus::New,
            "pending" => DownloadStatus::Pending,
            "deferred" => DownloadStatus::Deferred,
            "complete" => DownloadStatus::Complete,
            _ => DownloadStatus::Failed,
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full download record used by the scheduler and downloaders.
///
/// Timestamps are Unix seconds; `frequency` is in seconds. Presence of
/// `frequency` marks the download as recurring.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub id: JobId,
    pub url: String,
    pub status: DownloadStatus,
    pub attempts: i64,
    pub frequency: Option<i64>,
    pub next_download: Option<i64>,
    pub last_successful_download: Option<i64>,
    pub downloader: Option<String>,
    pub sub_downloader: Option<String>,
    pub error: Option<String>,
    pub location: Option<String>,
    pub destination: Option<Value>,
    pub settings: Option<Value>,
    pub info_json: Option<Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Download {
    pub fn is_recurring(&self) -> bool {
        self.frequency.is_some()
    }

    /// Destination directory, when the payload is a plain string path.
    pub fn destination_dir(&self) -> Option<&str> {
        self.destination.as_ref().and_then(Value::as_str)
    }
}

/// One URL to be created (or renewed) by a batch intake.
#[derive(Debug, Clone, Default)]
pub struct NewDownload {
    pub url: String,
    pub downloader: Option<String>,
    pub sub_downloader: Option<String>,
    pub frequency: Option<i64>,
    pub reset_attempts: bool,
    pub destination: Option<Value>,
    pub settings: Option<Value>,
    pub info_json: Option<Value>,
}

/// Which downloads a listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadFilter {
    #[default]
    All,
    Once,
    Recurring,
}

/// Number of downloads per status, for progress/event consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub new: u64,
    pub pending: u64,
    pub deferred: u64,
    pub failed: u64,
    pub complete: u64,
}

impl StatusCounts {
    pub fn get(&self, status: DownloadStatus) -> u64 {
        match status {
            DownloadStatus::New => self.new,
            DownloadStatus::Pending => self.pending,
            DownloadStatus::Deferred => self.deferred,
            DownloadStatus::Failed => self.failed,
            DownloadStatus::Complete => self.complete,
        }
    }

    pub(crate) fn add(&mut self, status: DownloadStatus, n: u64) {
        match status {
            DownloadStatus::New => self.new += n,
            DownloadStatus::Pending => self.pending += n,
            DownloadStatus::Deferred => self.deferred += n,
            DownloadStatus::Failed => self.failed += n,
            DownloadStatus::Complete => self.complete += n,
        }
    }

    pub fn total(&self) -> u64 {
        self.new + self.pending + self.deferred + self.failed + self.complete
    }
}
