//! Certificate issuance
//!
//! The [`Issuer`] trait hides the whole certificate-authority conversation
//! (orders, challenges, finalization) behind a single call. Renewal only
//! needs the resulting chain and its parsed leaf.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Duration;
use rustls::pki_types::CertificateDer;
use tenure_common::{Clock, DomainKey};
use tracing::debug;

use crate::cert::{Leaf, SigningKey};
use crate::error::AutocertResult;

/// A freshly issued certificate chain
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// Leaf first, then intermediates
    pub chain: Vec<CertificateDer<'static>>,
    pub leaf: Leaf,
}

impl IssuedCertificate {
    /// Parse the leaf out of a chain returned by a CA
    pub fn from_chain(chain: Vec<CertificateDer<'static>>) -> AutocertResult<Self> {
        let first = chain.first().ok_or_else(|| {
            crate::error::AutocertError::InvalidCertificate("issuer returned an empty chain".into())
        })?;
        let leaf = Leaf::parse(first)?;
        Ok(Self { chain, leaf })
    }
}

/// Obtains certificates from a certificate authority
#[async_trait]
pub trait Issuer: Send + Sync {
    /// Issue a certificate for `key` bound to `signing_key`
    async fn issue(
        &self,
        key: &DomainKey,
        signing_key: &SigningKey,
    ) -> anyhow::Result<IssuedCertificate>;
}

/// Issuer that signs certificates with their own key
///
/// For development setups and internal services without a CA. Validity
/// starts at the clock's current time.
#[derive(Debug)]
pub struct SelfSignedIssuer {
    clock: Arc<dyn Clock>,
    validity: Duration,
}

impl SelfSignedIssuer {
    pub fn new(clock: Arc<dyn Clock>, validity_days: u32) -> Self {
        Self {
            clock,
            validity: Duration::days(i64::from(validity_days)),
        }
    }
}

#[async_trait]
impl Issuer for SelfSignedIssuer {
    async fn issue(
        &self,
        key: &DomainKey,
        signing_key: &SigningKey,
    ) -> anyhow::Result<IssuedCertificate> {
        let now = self.clock.now();
        let not_after = now + self.validity;

        let cert = signing_key
            .self_signed(&[key.domain().to_string()], now, not_after)
            .with_context(|| format!("self-signing certificate for {key}"))?;

        debug!(domain = %key, expires = %not_after, "Issued self-signed certificate");
        Ok(IssuedCertificate::from_chain(vec![cert])?)
    }
}
