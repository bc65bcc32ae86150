use harvest_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Log file first; a read-only or missing state dir still gets stderr logging.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("could not open log file, logging to stderr: {:#}", e);
    }

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("harvest error: {:#}", err);
        std::process::exit(1);
    }
}
