//! Classify HTTP status and curl errors into download outcomes.

/// How a failed attempt should be treated by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The target can never succeed (gone, forbidden). Once-downloads fail.
    Unrecoverable,
    /// Worth retrying later with backoff.
    Transient,
}

/// Classify a non-2xx HTTP status code.
pub fn classify_http_status(code: u32) -> Outcome {
    match code {
        401 | 403 | 404 | 410 | 451 => Outcome::Unrecoverable,
        _ => Outcome::Transient,
    }
}

/// Classify a curl error. Only malformed URLs and unsupported protocols are permanent.
pub fn classify_curl_error(e: &curl::Error) -> Outcome {
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return Outcome::Unrecoverable;
    }
    Outcome::Transient
}
