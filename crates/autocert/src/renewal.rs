//! Per-domain renewal timer
//!
//! A [`DomainRenewal`] owns one timer. When it fires, the record either
//! adopts a certificate a peer instance already renewed into the shared
//! cache, or asks the issuer for a new one, then re-arms itself. Failures
//! re-arm after a jittered backoff; only [`DomainRenewal::stop`] ends the
//! loop.
//!
//! # Locking
//!
//! The timer slot has its own lock, held only around start, stop, fire
//! entry and re-arm. The shared state store has another. Neither is held
//! while talking to the cache or the issuer.
//!
//! # Races Between Instances
//!
//! Several processes may renew the same domain against one cache. There is
//! no distributed lock: before issuing, a record checks whether the cached
//! certificate is already far from expiry and, if so, adopts it.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tenure_common::DomainKey;
use tracing::{debug, info, trace, warn};

use crate::cert::{CertificateState, SigningKey};
use crate::context::RenewalContext;
use crate::delay::RENEW_JITTER;
use crate::error::{AutocertError, AutocertResult, CacheError};
use crate::metrics::RenewalOutcome;
use crate::scheduler::TimerHandle;

#[derive(Debug, Default)]
struct TimerSlot {
    handle: Option<TimerHandle>,
    /// Bumped on every `start`; a fired timer only re-arms while its
    /// generation is still current
    generation: u64,
}

/// Renewal state of one managed domain
#[derive(Debug)]
pub struct DomainRenewal {
    /// Collaborators shared with the other records of the manager
    ctx: Arc<RenewalContext>,
    /// Slot this record renews
    key: DomainKey,
    /// Key the next issuance is requested with
    signing_key: ArcSwap<SigningKey>,
    /// Armed timer, guarded separately from the state store
    timer: Mutex<TimerSlot>,
}

impl DomainRenewal {
    /// Create an idle record; call [`DomainRenewal::start`] to arm it
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared renewal context
    /// * `key` - Slot to renew
    /// * `signing_key` - Key of the slot's current certificate
    pub fn new(ctx: Arc<RenewalContext>, key: DomainKey, signing_key: SigningKey) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            key,
            signing_key: ArcSwap::from_pointee(signing_key),
            timer: Mutex::new(TimerSlot::default()),
        })
    }

    /// Slot this record renews
    pub fn key(&self) -> &DomainKey {
        &self.key
    }

    /// Key the next issuance will be requested with
    pub fn signing_key(&self) -> Arc<SigningKey> {
        self.signing_key.load_full()
    }

    /// Whether a timer is armed or an iteration is running
    pub fn is_active(&self) -> bool {
        self.timer.lock().handle.is_some()
    }

    /// Arm the renewal timer for a certificate expiring at `expiry`
    ///
    /// No-op if the timer is already armed.
    pub fn start(self: &Arc<Self>, expiry: DateTime<Utc>) {
        let mut timer = self.timer.lock();
        if timer.handle.is_some() {
            trace!(domain = %self.key, "Renewal timer already armed");
            return;
        }

        let delay = self.ctx.next_delay(expiry);
        timer.generation += 1;
        let generation = timer.generation;
        timer.handle = Some(self.arm(delay, generation));

        info!(
            domain = %self.key,
            expires = %expiry,
            delay_secs = delay.as_secs(),
            "Scheduled certificate renewal"
        );
    }

    /// Cancel the renewal timer
    ///
    /// No-op if no timer is armed. An iteration already running finishes
    /// but does not re-arm.
    pub fn stop(&self) {
        let mut timer = self.timer.lock();
        let Some(handle) = timer.handle.take() else {
            trace!(domain = %self.key, "Renewal timer not armed");
            return;
        };
        handle.cancel();
        debug!(domain = %self.key, "Stopped certificate renewal");
    }

    fn arm(self: &Arc<Self>, delay: Duration, generation: u64) -> TimerHandle {
        let this = Arc::clone(self);
        self.ctx
            .scheduler()
            .schedule(delay, Box::pin(async move { this.renew(generation).await }))
    }

    fn is_current(&self, generation: u64) -> bool {
        let timer = self.timer.lock();
        timer.handle.is_some() && timer.generation == generation
    }

    /// Timer callback: run one bounded attempt and re-arm
    async fn renew(self: Arc<Self>, generation: u64) {
        if !self.is_current(generation) {
            trace!(domain = %self.key, "Renewal timer fired after stop");
            return;
        }

        let timeout = self.ctx.config().renew_timeout();
        let result = match tokio::time::timeout(timeout, self.attempt()).await {
            Ok(result) => result,
            Err(_) => Err(AutocertError::Timeout(timeout)),
        };

        let (next, outcome, error) = match result {
            Ok((next, outcome)) => (next, outcome, None),
            Err(e) => {
                let next = self.ctx.backoff();
                warn!(
                    domain = %self.key,
                    error = %e,
                    retry_secs = next.as_secs(),
                    "Certificate renewal failed"
                );
                (next, RenewalOutcome::Failed, Some(e))
            }
        };

        {
            let mut timer = self.timer.lock();
            if timer.handle.is_none() || timer.generation != generation {
                debug!(domain = %self.key, "Renewal stopped during attempt, not re-arming");
                return;
            }
            timer.handle = Some(self.arm(next, generation));
        }

        trace!(domain = %self.key, delay_secs = next.as_secs(), "Re-armed renewal timer");
        self.ctx.report(&self.key, outcome, next, error.as_ref());
    }

    /// One renewal attempt, without the timer
    ///
    /// Returns the delay until the next attempt.
    ///
    /// # Errors
    ///
    /// Returns the issuance, derivation or cache write error. Shared state
    /// and the cache are left untouched in that case.
    pub async fn renew_once(&self) -> AutocertResult<Duration> {
        self.attempt().await.map(|(next, _)| next)
    }

    async fn attempt(&self) -> AutocertResult<(Duration, RenewalOutcome)> {
        // A peer may already have renewed into the shared cache
        match self.ctx.cache_get(&self.key).await {
            Ok(artifact) => {
                let next = self.ctx.next_delay(artifact.leaf().not_after);
                if next > self.ctx.config().renew_before() + RENEW_JITTER {
                    if self.ctx.can_sign(artifact.key()) {
                        info!(
                            domain = %self.key,
                            expires = %artifact.leaf().not_after,
                            "Adopting certificate renewed by a peer"
                        );
                        self.update_state(CertificateState::from_artifact(&artifact));
                        return Ok((next, RenewalOutcome::Adopted));
                    }
                    debug!(domain = %self.key, "Cached key cannot sign handshakes, issuing instead");
                }
            }
            Err(AutocertError::Cache(CacheError::Miss)) => {
                trace!(domain = %self.key, "No cached certificate");
            }
            Err(e) => {
                debug!(domain = %self.key, error = %e, "Cached certificate unusable, issuing instead");
            }
        }

        let signing_key = self.signing_key.load_full();
        let state = self.ctx.issue(&self.key, &signing_key).await?;
        let expires = state.expires();
        let next = self.ctx.next_delay(expires);
        self.update_state(state);

        info!(
            domain = %self.key,
            expires = %expires,
            next_secs = next.as_secs(),
            "Certificate renewed"
        );
        Ok((next, RenewalOutcome::Issued))
    }

    /// Commit a state to the shared store and carry its key forward
    fn update_state(&self, state: CertificateState) {
        let signing_key = state.key().clone();
        self.ctx.state_store().insert(self.key.clone(), state);
        self.signing_key.store(Arc::new(signing_key));
    }
}
