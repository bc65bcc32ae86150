//! Cooperative cancellation for downloaders that run external processes.
//!
//! Each downloader owns a `KillSwitch`. `DownloadManager::stop()` flips the
//! switch of every registered downloader; the process runner observes it on
//! its next liveness poll, kills the child and clears the flag.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared per-downloader kill flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    flag: Arc<AtomicBool>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that every in-flight run of this downloader be killed.
    pub fn kill(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Drop a pending kill request that no run has observed yet.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns true (and resets the flag) if a kill was requested.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Default path for the daemon control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("harvest")?.get_state_home();
    Ok(dir.join("control.sock"))
}
