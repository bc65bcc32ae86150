//! CLI command handlers, one file per command (related admin commands share a file).

mod add;
mod cleanup;
mod downloaders;
mod kill;
mod lifecycle;
mod recurring;
mod remove;
mod restart;
mod run;
mod skip;
mod status;

pub use add::run_add;
pub use cleanup::{run_delete_completed, run_delete_failed};
pub use downloaders::run_downloaders;
pub use kill::run_kill;
pub use lifecycle::{run_disable, run_enable, run_stop};
pub use recurring::run_recurring;
pub use remove::run_remove;
pub use restart::run_restart;
pub use run::run_daemon;
pub use skip::run_skip;
pub use status::run_status;

use crate::cli::control_socket::{self, ControlRequest};

/// Ask a running daemon to start a pass, or tell the user to start one.
async fn poke_daemon() {
    if !control_socket::notify_daemon(ControlRequest::Pass).await {
        println!("No daemon running; start `harvest run` to download.");
    }
}
