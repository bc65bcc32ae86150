//! Recurring slot allocation: spread a cohort of recurring downloads that share
//! a frequency evenly over the next whole period.
//!
//! Periods are aligned to a fixed epoch so every member of a cohort agrees on
//! where the next period starts. Inside a period of length `F` the cohort of
//! `N` members gets `N` evenly spaced instants `k * F / N`; member ranks are
//! mapped onto those instants in van der Corput (bit-reversal) order, so the
//! first members of a cohort are as far apart as possible and shrinking the
//! cohort re-spreads the rest instead of bunching them at the period start.

/// 2000-01-01T00:00:00Z, the reference instant periods are counted from.
pub const SLOT_EPOCH: i64 = 946_684_800;

/// Fraction in [0, 1) for index `i` of the base-2 van der Corput sequence.
fn van_der_corput(mut i: u64) -> f64 {
    let mut denom = 1.0;
    let mut out = 0.0;
    while i > 0 {
        denom *= 2.0;
        out += (i & 1) as f64 / denom;
        i >>= 1;
    }
    out
}

/// Slot index (0..n) assigned to each rank 0..n.
pub fn spread_positions(n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| van_der_corput(*a as u64).total_cmp(&van_der_corput(*b as u64)));
    let mut positions = vec![0; n];
    for (slot, rank) in order.into_iter().enumerate() {
        positions[rank] = slot;
    }
    positions
}

/// Start of the whole period (aligned to `SLOT_EPOCH`) following the one containing `now`.
pub fn next_period_start(now: i64, frequency: i64) -> i64 {
    let frequency = i128::from(frequency.max(1));
    let elapsed = (i128::from(now) - i128::from(SLOT_EPOCH)).div_euclid(frequency);
    clamp_i64(i128::from(SLOT_EPOCH) + (elapsed + 1) * frequency)
}

/// Periods far in the future pin to `i64::MAX` instead of overflowing.
fn clamp_i64(v: i128) -> i64 {
    v.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// `next_download` for the cohort member at `rank` out of `cohort_len`.
pub fn next_slot(now: i64, frequency: i64, rank: usize, cohort_len: usize) -> i64 {
    let frequency = frequency.max(1);
    let start = next_period_start(now, frequency);
    let n = cohort_len.max(1);
    let position = spread_positions(n)
        .get(rank)
        .copied()
        .unwrap_or(rank % n);
    let offset = (frequency as i128 * position as i128 / n as i128) as i64;
    start.saturating_add(offset)
}
