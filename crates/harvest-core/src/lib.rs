pub mod config;
pub mod logging;

pub mod control;
pub mod downloader;
pub mod job_db;
pub mod process;
pub mod retry;
pub mod scheduler;
pub mod slots;
