//! Retry and backoff policy.
//!
//! Failure classification (permanent vs. worth retrying) and the exponential
//! backoff used to schedule deferred downloads.

mod classify;
mod policy;

pub use classify::{classify_curl_error, classify_http_status, Outcome};
pub use policy::BackoffPolicy;
