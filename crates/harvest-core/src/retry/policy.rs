/// Exponential backoff for deferred downloads: `base^attempts` units,
/// capped at the download's frequency when it is recurring.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Growth factor per attempt.
    pub base: u32,
    /// Length of one backoff unit, in seconds.
    pub unit_secs: i64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        // 3, 9, 27, 81 hours, ...
        Self {
            base: 3,
            unit_secs: 60 * 60,
        }
    }
}

impl BackoffPolicy {
    /// Delay in seconds before a deferred download should run again.
    ///
    /// `attempts` is the number of attempts made so far (1 after the first failure).
    /// Saturates instead of overflowing for very large attempt counts.
    pub fn delay_secs(&self, attempts: i64, frequency: Option<i64>) -> i64 {
        let exp = attempts.clamp(0, u32::MAX as i64) as u32;
        let factor = (self.base as i64).checked_pow(exp).unwrap_or(i64::MAX);
        let delay = factor.saturating_mul(self.unit_secs);
        match frequency {
            Some(freq) => delay.min(freq.max(0)),
            None => delay,
        }
    }

    /// Absolute `next_download` for a deferral made at `now`.
    pub fn next_attempt_at(&self, now: i64, attempts: i64, frequency: Option<i64>) -> i64 {
        now.saturating_add(self.delay_secs(attempts, frequency))
    }
}
