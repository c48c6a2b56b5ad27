//! Prometheus metrics for the renewal loop.

use std::time::Duration;

use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};
use tenure_common::DomainKey;
use tracing::trace;

/// Result of one renewal iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// A new certificate was obtained from the issuer
    Issued,
    /// A peer's fresher certificate was taken from the cache
    Adopted,
    /// The attempt failed and will be retried after backoff
    Failed,
}

impl RenewalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalOutcome::Issued => "issued",
            RenewalOutcome::Adopted => "adopted",
            RenewalOutcome::Failed => "failed",
        }
    }
}

/// Renewal counters and gauges
#[derive(Debug, Clone)]
pub struct RenewalMetrics {
    renewals: IntCounterVec,
    next_renewal: GaugeVec,
}

impl RenewalMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let renewals = IntCounterVec::new(
            Opts::new(
                "tenure_renewals_total",
                "Certificate renewal iterations by outcome",
            ),
            &["outcome"],
        )?;
        let next_renewal = GaugeVec::new(
            Opts::new(
                "tenure_next_renewal_seconds",
                "Seconds until the next scheduled renewal attempt",
            ),
            &["domain"],
        )?;

        registry.register(Box::new(renewals.clone()))?;
        registry.register(Box::new(next_renewal.clone()))?;

        Ok(Self {
            renewals,
            next_renewal,
        })
    }

    /// Record an iteration and the delay chosen after it
    pub fn record(&self, key: &DomainKey, outcome: RenewalOutcome, next: Duration) {
        self.renewals.with_label_values(&[outcome.as_str()]).inc();
        self.next_renewal
            .with_label_values(&[key.to_string().as_str()])
            .set(next.as_secs_f64());
    }

    pub fn renewals(&self, outcome: RenewalOutcome) -> u64 {
        self.renewals.with_label_values(&[outcome.as_str()]).get()
    }

    /// Seconds until the next attempt last recorded for a domain
    pub fn next_renewal_secs(&self, key: &DomainKey) -> f64 {
        self.next_renewal
            .with_label_values(&[key.to_string().as_str()])
            .get()
    }

    /// Drop the per-domain gauge once a domain is no longer managed
    ///
    /// Returns `false` if no gauge was recorded for the domain.
    pub fn forget(&self, key: &DomainKey) -> bool {
        match self
            .next_renewal
            .remove_label_values(&[key.to_string().as_str()])
        {
            Ok(()) => true,
            Err(e) => {
                trace!(domain = %key, error = %e, "No renewal gauge to remove");
                false
            }
        }
    }
}
