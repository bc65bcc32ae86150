//! In-place state transitions for a download row. Callers persist with `JobDb::save`.

use super::db::unix_timestamp;
use super::types::{Download, DownloadStatus, JobId, NewDownload};

/// Returned when `fail()` is called on a recurring download.
///
/// Recurring downloads must never become `failed`; this is a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("recurring download {id} cannot be failed")]
pub struct RecurringFail {
    pub id: JobId,
}

impl Download {
    /// Back to `new` so the next pass picks it up. Optionally zero `attempts`.
    pub fn renew(&mut self, reset_attempts: bool) {
        self.status = DownloadStatus::New;
        if reset_attempts {
            self.attempts = 0;
        }
        if !self.is_recurring() {
            self.next_download = None;
        }
    }

    /// Attempt failed but may succeed later.
    pub fn defer(&mut self) {
        self.status = DownloadStatus::Deferred;
    }

    /// Permanent failure. Rejected for recurring downloads.
    pub fn fail(&mut self) -> Result<(), RecurringFail> {
        if self.is_recurring() {
            return Err(RecurringFail { id: self.id });
        }
        self.status = DownloadStatus::Failed;
        self.next_download = None;
        Ok(())
    }

    /// Called immediately before the downloader runs.
    pub fn started(&mut self) {
        self.status = DownloadStatus::Pending;
        self.attempts += 1;
    }

    pub fn complete(&mut self) {
        self.status = DownloadStatus::Complete;
        self.error = None;
        self.last_successful_download = Some(unix_timestamp());
    }

    /// Merge an intake request into an existing (or freshly inserted) row and renew it.
    ///
    /// A recurring row whose frequency changes is treated as a new definition and
    /// starts again from zero attempts with no schedule.
    pub(crate) fn apply_request(&mut self, req: &NewDownload) {
        let redefined = req.frequency.is_some() && req.frequency != self.frequency;
        if req.frequency.is_some() {
            self.frequency = req.frequency;
        }
        if redefined {
            self.next_download = None;
        }
        self.renew(req.reset_attempts || redefined);
        if req.downloader.is_some() {
            self.downloader = req.downloader.clone();
        }
        if req.sub_downloader.is_some() {
            self.sub_downloader = req.sub_downloader.clone();
        }
        if req.destination.is_some() {
            self.destination = req.destination.clone();
        }
        if req.settings.is_some() {
            self.settings = req.settings.clone();
        }
        if req.info_json.is_some() {
            self.info_json = req.info_json.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(frequency: Option<i64>) -> Download {
        Download {
            id: 7,
            url: "https://example.com/a".to_string(),
            status: DownloadStatus::New,
            attempts: 0,
            frequency,
            next_download: None,
            last_successful_download: None,
            downloader: None,
            sub_downloader: None,
            error: None,
            location: None,
            destination: None,
            settings: None,
            info_json: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn started_marks_pending_and_counts_attempt() {
        let mut d = download(None);
        d.started();
        d.started();
        assert_eq!(d.status, DownloadStatus::Pending);
        assert_eq!(d.attempts, 2);
    }

    #[test]
    fn complete_clears_error_and_stamps_success() {
        let mut d = download(None);
        d.error = Some("boom".to_string());
        d.complete();
        assert_eq!(d.status, DownloadStatus::Complete);
        assert!(d.error.is_none());
        assert!(d.last_successful_download.is_some());
    }

    #[test]
    fn fail_rejected_for_recurring() {
        let mut d = download(Some(3600));
        d.status = DownloadStatus::Pending;
        assert_eq!(d.fail(), Err(RecurringFail { id: 7 }));
        assert_eq!(d.status, DownloadStatus::Pending);

        let mut once = download(None);
        once.next_download = Some(10);
        once.fail().unwrap();
        assert_eq!(once.status, DownloadStatus::Failed);
        assert!(once.next_download.is_none());
    }

    #[test]
    fn renew_keeps_attempts_unless_reset() {
        let mut d = download(None);
        d.attempts = 3;
        d.status = DownloadStatus::Deferred;
        d.next_download = Some(100);
        d.renew(false);
        assert_eq!(d.status, DownloadStatus::New);
        assert_eq!(d.attempts, 3);
        assert!(d.next_download.is_none());
        d.renew(true);
        assert_eq!(d.attempts, 0);

        let mut r = download(Some(60));
        r.next_download = Some(100);
        r.renew(false);
        assert_eq!(r.next_download, Some(100));
    }

    #[test]
    fn changed_frequency_redefines_recurring_download() {
        let mut d = download(Some(3600));
        d.attempts = 4;
        d.next_download = Some(500);
        d.status = DownloadStatus::Complete;
        d.apply_request(&NewDownload {
            url: d.url.clone(),
            frequency: Some(7200),
            ..Default::default()
        });
        assert_eq!(d.frequency, Some(7200));
        assert_eq!(d.attempts, 0);
        assert!(d.next_download.is_none());
        assert_eq!(d.status, DownloadStatus::New);
    }
}
