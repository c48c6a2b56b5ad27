//! Background TLS certificate renewal
//!
//! Keeps issued certificates renewed ahead of expiry, for any number of
//! domains and any number of cooperating instances sharing one cache.
//!
//! # Features
//!
//! - One jittered renewal timer per managed domain
//! - Peer adoption: a certificate another instance already renewed into the
//!   shared cache is taken over instead of issuing again
//! - Jittered backoff on failure, the loop never gives up on its own
//! - Pluggable certificate cache and issuer
//!
//! # Architecture
//!
//! - [`RenewalManager`] - Owns the renewal records and serves handshake keys
//! - [`DomainRenewal`] - Timer and renewal logic for one domain slot
//! - [`RenewalContext`] - Collaborators shared by all records of a manager
//! - [`StateStore`] - Current certificate per slot, read by the TLS path
//! - [`CertCache`] - Shared persistent storage ([`DirCache`], [`MemoryCache`])
//! - [`Issuer`] - Obtains new certificates ([`SelfSignedIssuer`] included)
//! - [`Scheduler`] - One-shot timers ([`TokioScheduler`], [`ManualScheduler`])
//!
//! # Renewal Flow
//!
//! When a domain's timer fires:
//!
//! 1. The cached certificate is loaded and validated
//! 2. If it is far enough from expiry it is adopted as-is
//! 3. Otherwise the issuer is asked for a new certificate, which is written
//!    to the cache and then committed to the state store
//! 4. The timer is re-armed for `expiry - renew_before - jitter`, or after a
//!    backoff of half an hour plus jitter if the attempt failed

pub mod cache;
pub mod cert;
pub mod config;
pub mod context;
pub mod delay;
pub mod error;
pub mod issuer;
pub mod manager;
pub mod metrics;
pub mod renewal;
pub mod scheduler;
pub mod state;

pub use cache::{CertCache, DirCache, MemoryCache};
pub use cert::{CertificateState, Leaf, SigningKey, TlsArtifact};
pub use config::RenewalConfig;
pub use context::{RenewalContext, RenewalHook, SigningCheck};
pub use delay::RENEW_JITTER;
pub use error::{AutocertError, AutocertResult, CacheError};
pub use issuer::{IssuedCertificate, Issuer, SelfSignedIssuer};
pub use manager::RenewalManager;
pub use metrics::{RenewalMetrics, RenewalOutcome};
pub use renewal::DomainRenewal;
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use state::StateStore;

pub use tenure_common::{DomainKey, KeyType};
