//! Persistent download/job database (SQLite via sqlx).
//!
//! Stores one row per requested URL with its status, retry bookkeeping and
//! recurring schedule, plus the URL skip list.

pub mod db;
mod jobs;
mod skip_list;
mod transitions;
pub mod types;

pub use db::*;
pub use transitions::RecurringFail;
pub use types::*;
