//! Type-safe identifiers for managed certificate slots.
//!
//! A [`DomainKey`] names one certificate slot: the domain it serves and the
//! kind of key it is signed with. It is the map key for shared certificate
//! state and, through its [`Display`](fmt::Display) form, the cache entry name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Suffix appended to the cache name of RSA slots.
const RSA_SUFFIX: &str = "+rsa";

/// Kind of signing key a certificate slot uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// ECDSA P-256 (the default for new slots)
    #[default]
    Ecdsa,
    /// RSA, kept for clients that cannot negotiate ECDSA
    Rsa,
}

/// Identifier of a managed certificate slot.
///
/// Domain names are normalized to lowercase without a trailing dot, so
/// `Example.COM.` and `example.com` name the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainKey {
    domain: String,
    #[serde(default)]
    key_type: KeyType,
}

impl DomainKey {
    /// Create an ECDSA slot for a domain
    pub fn new(domain: impl AsRef<str>) -> Self {
        Self::with_key_type(domain, KeyType::Ecdsa)
    }

    /// Create a slot for a domain with an explicit key type
    pub fn with_key_type(domain: impl AsRef<str>, key_type: KeyType) -> Self {
        let domain = domain.as_ref().trim_end_matches('.').to_ascii_lowercase();
        Self { domain, key_type }
    }

    /// Domain name served by this slot
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Key type of this slot
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Whether this slot uses an RSA key
    pub fn is_rsa(&self) -> bool {
        self.key_type == KeyType::Rsa
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_type {
            KeyType::Ecdsa => f.write_str(&self.domain),
            KeyType::Rsa => write!(f, "{}{}", self.domain, RSA_SUFFIX),
        }
    }
}

/// Error returned when parsing an empty cache name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("domain name is empty")]
pub struct EmptyDomainError;

impl FromStr for DomainKey {
    type Err = EmptyDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, key_type) = match s.strip_suffix(RSA_SUFFIX) {
            Some(domain) => (domain, KeyType::Rsa),
            None => (s, KeyType::Ecdsa),
        };
        if domain.trim_end_matches('.').is_empty() {
            return Err(EmptyDomainError);
        }
        Ok(Self::with_key_type(domain, key_type))
    }
}

impl From<&str> for DomainKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
