//! Error types for certificate renewal.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by certificate cache backends
#[derive(Debug, Error)]
pub enum CacheError {
    /// No entry stored under the requested key
    #[error("cache miss")]
    Miss,

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    /// Whether this is a plain miss rather than a backend failure
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }
}

/// Errors raised while obtaining, validating or committing certificates
#[derive(Debug, Error)]
pub enum AutocertError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The issuer (CA protocol) failed
    #[error("certificate issuance failed: {0:#}")]
    Issuance(anyhow::Error),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Private key does not belong to the leaf certificate
    #[error("private key does not match certificate public key")]
    KeyMismatch,

    #[error("invalid private key: {0}")]
    Key(String),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("renewal attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for renewal operations
pub type AutocertResult<T> = Result<T, AutocertError>;
