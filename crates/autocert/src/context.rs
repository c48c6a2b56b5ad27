//! Shared renewal context
//!
//! Everything the renewal records of one manager have in common: settings,
//! time and randomness, the scheduler, the cache, the issuer, the shared
//! state store and the observability sinks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tenure_common::{Clock, DomainKey, RandomSource, SystemClock, ThreadRandom};
use tracing::{debug, trace};

use crate::cache::CertCache;
use crate::cert::{CertificateState, SigningKey, TlsArtifact};
use crate::config::RenewalConfig;
use crate::delay;
use crate::error::{AutocertError, AutocertResult};
use crate::issuer::Issuer;
use crate::metrics::{RenewalMetrics, RenewalOutcome};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::state::StateStore;

/// Called after every renewal iteration with the next delay and the error,
/// if the iteration failed
pub type RenewalHook = Arc<dyn Fn(&DomainKey, Duration, Option<&AutocertError>) + Send + Sync>;

/// Decides whether a cached key can sign handshakes before it is adopted
pub type SigningCheck = Arc<dyn Fn(&SigningKey) -> bool + Send + Sync>;

/// Collaborators shared by every renewal record of a manager
pub struct RenewalContext {
    /// Lead time and attempt timeout
    config: RenewalConfig,
    /// Source of "now" for delays and validity checks
    clock: Arc<dyn Clock>,
    /// Jitter draws
    random: Arc<dyn RandomSource>,
    /// Arms the one-shot renewal timers
    scheduler: Arc<dyn Scheduler>,
    /// Storage shared with peer instances
    cache: Arc<dyn CertCache>,
    /// Certificate authority
    issuer: Arc<dyn Issuer>,
    /// Current certificate per slot, also read by the TLS path
    state: Arc<StateStore>,
    /// Called after every renewal iteration
    hook: Option<RenewalHook>,
    /// Gate on adopting a peer's key
    signing_check: SigningCheck,
    /// Renewal counters, if exported
    metrics: Option<RenewalMetrics>,
}

impl RenewalContext {
    /// Create a context using the system clock, thread-local randomness,
    /// Tokio timers and a fresh state store
    ///
    /// # Arguments
    ///
    /// * `config` - Lead time and attempt timeout
    /// * `issuer` - Certificate authority new certificates come from
    /// * `cache` - Storage shared with other instances
    ///
    /// # Errors
    ///
    /// Returns [`AutocertError::Config`] if `config` is out of range.
    pub fn new(
        config: RenewalConfig,
        issuer: Arc<dyn Issuer>,
        cache: Arc<dyn CertCache>,
    ) -> AutocertResult<Self> {
        config.check()?;

        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            random: Arc::new(ThreadRandom),
            scheduler: Arc::new(TokioScheduler),
            cache,
            issuer,
            state: Arc::new(StateStore::new()),
            hook: None,
            signing_check: Arc::new(SigningKey::has_signing_capability),
            metrics: None,
        })
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the source of jitter draws
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Replace the timer scheduler
    ///
    /// The default [`TokioScheduler`] needs a running Tokio runtime when a
    /// record is started.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Share a state store with the certificate-serving path
    pub fn with_state_store(mut self, state: Arc<StateStore>) -> Self {
        self.state = state;
        self
    }

    /// Observe every renewal iteration
    pub fn with_hook(mut self, hook: RenewalHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Replace the check a cached key must pass before a peer's
    /// certificate is adopted
    ///
    /// Defaults to [`SigningKey::has_signing_capability`].
    pub fn with_signing_check(mut self, check: SigningCheck) -> Self {
        self.signing_check = check;
        self
    }

    /// Export renewal counters
    pub fn with_metrics(mut self, metrics: RenewalMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Renewal settings
    pub fn config(&self) -> &RenewalConfig {
        &self.config
    }

    /// Store the renewal records commit into
    pub fn state_store(&self) -> &Arc<StateStore> {
        &self.state
    }

    /// Renewal metrics, if configured
    pub fn metrics(&self) -> Option<&RenewalMetrics> {
        self.metrics.as_ref()
    }

    pub(crate) fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    /// Whether `key` may be adopted to answer handshakes
    pub(crate) fn can_sign(&self, key: &SigningKey) -> bool {
        (self.signing_check)(key)
    }

    /// Current time according to the context's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Jittered wait before renewing a certificate expiring at `expiry`
    pub fn next_delay(&self, expiry: DateTime<Utc>) -> Duration {
        let jitter = delay::draw_renewal_jitter(self.random.as_ref());
        delay::renewal_delay(expiry, self.now(), self.config.renew_before(), jitter)
    }

    /// Wait before retrying a failed attempt
    pub fn backoff(&self) -> Duration {
        delay::backoff_delay(delay::draw_backoff_jitter(self.random.as_ref()))
    }

    /// Load and validate the cached artifact for a slot
    ///
    /// The artifact must decode, be inside its validity window and name the
    /// slot's domain.
    pub async fn cache_get(&self, key: &DomainKey) -> AutocertResult<TlsArtifact> {
        let data = self.cache.get(key).await?;
        let artifact = TlsArtifact::decode(&data)?;

        let now = self.now();
        let leaf = artifact.leaf();
        if !leaf.is_valid_at(now) {
            return Err(AutocertError::InvalidCertificate(format!(
                "cached certificate for {key} is outside its validity window ({} - {})",
                leaf.not_before, leaf.not_after
            )));
        }
        if !leaf.covers(key.domain()) {
            return Err(AutocertError::InvalidCertificate(format!(
                "cached certificate does not cover {}",
                key.domain()
            )));
        }

        trace!(domain = %key, expires = %leaf.not_after, "Loaded cached certificate");
        Ok(artifact)
    }

    pub async fn cache_put(&self, key: &DomainKey, artifact: &TlsArtifact) -> AutocertResult<()> {
        self.cache.put(key, &artifact.encode()).await?;
        Ok(())
    }

    /// Issue a certificate and persist it to the cache
    ///
    /// The shared state store is not touched; callers commit the returned
    /// state once this succeeds.
    pub(crate) async fn issue(
        &self,
        key: &DomainKey,
        signing_key: &SigningKey,
    ) -> AutocertResult<CertificateState> {
        debug!(domain = %key, "Requesting certificate from issuer");
        let issued = self
            .issuer
            .issue(key, signing_key)
            .await
            .map_err(AutocertError::Issuance)?;

        let state = CertificateState::new(signing_key.clone(), issued.chain, issued.leaf);
        let artifact = state.tls_artifact()?;
        self.cache_put(key, &artifact).await?;

        Ok(state)
    }

    /// Publish the result of one iteration to metrics and the hook
    pub(crate) fn report(
        &self,
        key: &DomainKey,
        outcome: RenewalOutcome,
        next: Duration,
        error: Option<&AutocertError>,
    ) {
        if let Some(metrics) = &self.metrics {
            metrics.record(key, outcome, next);
        }
        if let Some(hook) = &self.hook {
            hook(key, next, error);
        }
    }
}

impl fmt::Debug for RenewalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenewalContext")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("scheduler", &self.scheduler)
            .field("managed_states", &self.state.len())
            .field("has_hook", &self.hook.is_some())
            .field("has_metrics", &self.metrics.is_some())
            .finish()
    }
}
