//! Renewal delay computation
//!
//! ```text
//! delay   = max(0, (expiry - now) - lead_time - U)     U ~ [0, RENEW_JITTER)
//! backoff = RENEW_JITTER/2 + V                         V ~ [0, RENEW_JITTER/2)
//! ```
//!
//! The jitter spreads renewals of a fleet across an hour so instances do not
//! hit the issuer in bursts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tenure_common::RandomSource;

/// Maximum random deviation from the configured lead time
pub const RENEW_JITTER: Duration = Duration::from_secs(3600);

/// Wait before renewing a certificate that expires at `expiry`
///
/// `jitter` is the draw `U`; values at or above [`RENEW_JITTER`] are not
/// expected but still only shorten the wait.
pub fn renewal_delay(
    expiry: DateTime<Utc>,
    now: DateTime<Utc>,
    lead_time: Duration,
    jitter: Duration,
) -> Duration {
    let Ok(remaining) = (expiry - now).to_std() else {
        // already expired
        return Duration::ZERO;
    };
    remaining
        .saturating_sub(lead_time)
        .saturating_sub(jitter)
}

/// Wait before retrying after a failed attempt
pub fn backoff_delay(jitter: Duration) -> Duration {
    RENEW_JITTER / 2 + jitter
}

/// Draw `U` uniformly from `[0, RENEW_JITTER)`
pub fn draw_renewal_jitter(random: &dyn RandomSource) -> Duration {
    Duration::from_nanos(random.below(RENEW_JITTER.as_nanos() as u64))
}

/// Draw `V` uniformly from `[0, RENEW_JITTER/2)`
pub fn draw_backoff_jitter(random: &dyn RandomSource) -> Duration {
    Duration::from_nanos(random.below((RENEW_JITTER / 2).as_nanos() as u64))
}
