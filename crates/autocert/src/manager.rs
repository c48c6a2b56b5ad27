//! Renewal manager
//!
//! Owns the [`DomainRenewal`] records of every managed domain and answers
//! certificate lookups for the serving path.
//!
//! # Lifecycle
//!
//! 1. [`RenewalManager::ensure_certificate`] or [`RenewalManager::manage`]
//!    makes a domain managed and starts its renewal timer
//! 2. The timer renews in the background until the domain is released
//! 3. [`RenewalManager::release`] or [`RenewalManager::shutdown`] stops it

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rustls::sign::CertifiedKey;
use tenure_common::DomainKey;
use tracing::{debug, info};

use crate::cert::{CertificateState, SigningKey};
use crate::context::RenewalContext;
use crate::error::{AutocertError, AutocertResult};
use crate::renewal::DomainRenewal;

/// Owner of all per-domain renewal records
///
/// Dropping the manager stops every renewal timer.
pub struct RenewalManager {
    /// Collaborators shared with every record
    ctx: Arc<RenewalContext>,
    /// One renewal record per managed slot
    renewals: DashMap<DomainKey, Arc<DomainRenewal>>,
}

impl RenewalManager {
    /// Create a manager with no managed domains
    ///
    /// # Arguments
    ///
    /// * `ctx` - Collaborators shared by all renewal records
    pub fn new(ctx: RenewalContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            renewals: DashMap::new(),
        }
    }

    /// Shared renewal context
    pub fn context(&self) -> &Arc<RenewalContext> {
        &self.ctx
    }

    /// Current certificate for a domain, obtaining one if needed
    ///
    /// Looks in the shared state store, then the cache, and finally issues
    /// with a freshly generated key. The domain is managed afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable cached certificate exists and issuance
    /// fails, times out or cannot be written to the cache. The domain is not
    /// managed in that case.
    pub async fn ensure_certificate(
        &self,
        key: &DomainKey,
    ) -> AutocertResult<Arc<CertificateState>> {
        if let Some(state) = self.ctx.state_store().get(key) {
            self.start_renewal(key, state.key().clone(), state.expires());
            return Ok(state);
        }

        let state = match self.ctx.cache_get(key).await {
            Ok(artifact) => {
                debug!(domain = %key, "Using cached certificate");
                CertificateState::from_artifact(&artifact)
            }
            Err(e) => {
                if !matches!(e, AutocertError::Cache(ref c) if c.is_miss()) {
                    debug!(domain = %key, error = %e, "Cached certificate unusable");
                }
                self.issue(key).await?
            }
        };

        let state = Arc::new(state);
        self.manage(key.clone(), CertificateState::clone(&state));
        Ok(state)
    }

    /// Handshake key for a domain from the current state
    pub fn certified_key(&self, key: &DomainKey) -> Option<Arc<CertifiedKey>> {
        self.ctx.state_store().certified_key(key)
    }

    async fn issue(&self, key: &DomainKey) -> AutocertResult<CertificateState> {
        let signing_key = SigningKey::generate(key.key_type())?;
        let timeout = self.ctx.config().renew_timeout();

        let state = tokio::time::timeout(timeout, self.ctx.issue(key, &signing_key))
            .await
            .map_err(|_| AutocertError::Timeout(timeout))??;

        info!(domain = %key, expires = %state.expires(), "Obtained certificate");
        Ok(state)
    }

    /// Commit a certificate obtained elsewhere and keep it renewed
    pub fn manage(&self, key: DomainKey, state: CertificateState) {
        let signing_key = state.key().clone();
        let expires = state.expires();
        self.ctx.state_store().insert(key.clone(), state);
        self.start_renewal(&key, signing_key, expires);
    }

    fn start_renewal(&self, key: &DomainKey, signing_key: SigningKey, expires: DateTime<Utc>) {
        let renewal = self
            .renewals
            .entry(key.clone())
            .or_insert_with(|| DomainRenewal::new(Arc::clone(&self.ctx), key.clone(), signing_key))
            .clone();
        renewal.start(expires);
    }

    /// Stop renewing a domain
    ///
    /// The current certificate stays in the state store. Returns `false` if
    /// the domain was not managed.
    pub fn release(&self, key: &DomainKey) -> bool {
        let Some((_, renewal)) = self.renewals.remove(key) else {
            return false;
        };
        renewal.stop();
        if let Some(metrics) = self.ctx.metrics() {
            metrics.forget(key);
        }
        info!(domain = %key, "Released domain from renewal");
        true
    }

    /// Stop every renewal timer
    pub fn shutdown(&self) {
        let keys = self.managed_domains();
        for key in &keys {
            self.release(key);
        }
        if !keys.is_empty() {
            info!(domain_count = keys.len(), "Stopped all certificate renewals");
        }
    }

    /// Slots with a renewal record
    pub fn managed_domains(&self) -> Vec<DomainKey> {
        self.renewals.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Whether a slot has a renewal record
    pub fn is_managed(&self, key: &DomainKey) -> bool {
        self.renewals.contains_key(key)
    }

    /// Renewal record of a slot
    pub fn renewal(&self, key: &DomainKey) -> Option<Arc<DomainRenewal>> {
        self.renewals.get(key).map(|entry| Arc::clone(entry.value()))
    }
}

impl Drop for RenewalManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RenewalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalManager")
            .field("managed_domains", &self.renewals.len())
            .field("context", &self.ctx)
            .finish()
    }
}
