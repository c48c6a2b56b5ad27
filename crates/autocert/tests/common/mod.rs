//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tenure_autocert::{IssuedCertificate, Issuer, SelfSignedIssuer, SigningKey};
use tenure_common::{DomainKey, ManualClock};
use tracing_subscriber::EnvFilter;

pub const DAY: Duration = Duration::from_secs(24 * 3600);

/// Route test logs through the test writer; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

/// Self-signing issuer that counts how often it was asked
#[derive(Debug)]
pub struct CountingIssuer {
    inner: SelfSignedIssuer,
    calls: AtomicUsize,
}

impl CountingIssuer {
    pub fn new(clock: Arc<ManualClock>, validity_days: u32) -> Self {
        Self {
            inner: SelfSignedIssuer::new(clock, validity_days),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Issuer for CountingIssuer {
    async fn issue(
        &self,
        key: &DomainKey,
        signing_key: &SigningKey,
    ) -> anyhow::Result<IssuedCertificate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.issue(key, signing_key).await
    }
}

/// Move the clock to where a timer armed with `delay` fires, in whole
/// seconds
pub fn advance_to_fire(clock: &ManualClock, delay: Duration) {
    clock.advance(chrono::Duration::seconds(delay.as_secs() as i64));
}

/// Whether `actual` lies within `[expected - tolerance, expected]`
pub fn within_jitter(actual: Duration, expected: Duration, tolerance: Duration) -> bool {
    actual <= expected && actual + tolerance >= expected
}
