//! Shared certificate state
//!
//! The one map from [`DomainKey`] to the current [`CertificateState`]. Every
//! renewal record writes through it and the certificate-serving path reads
//! from it. A single lock guards the map; it is held only for the map access
//! itself and never across I/O.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rustls::sign::CertifiedKey;
use tenure_common::DomainKey;
use tracing::{debug, trace, warn};

use crate::cert::CertificateState;

/// Lock-guarded map of current certificate material
#[derive(Debug, Default)]
pub struct StateStore {
    states: Mutex<HashMap<DomainKey, Arc<CertificateState>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a domain
    pub fn get(&self, key: &DomainKey) -> Option<Arc<CertificateState>> {
        self.states.lock().get(key).cloned()
    }

    /// Replace the state for a domain, returning the previous one
    pub fn insert(
        &self,
        key: DomainKey,
        state: CertificateState,
    ) -> Option<Arc<CertificateState>> {
        let expires = state.expires();
        let previous = self.states.lock().insert(key.clone(), Arc::new(state));
        debug!(domain = %key, expires = %expires, "Updated certificate state");
        previous
    }

    /// Drop the state for a domain
    pub fn remove(&self, key: &DomainKey) -> Option<Arc<CertificateState>> {
        let removed = self.states.lock().remove(key);
        if removed.is_some() {
            trace!(domain = %key, "Removed certificate state");
        }
        removed
    }

    pub fn contains(&self, key: &DomainKey) -> bool {
        self.states.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    /// Handshake key for a domain
    ///
    /// Built outside the lock from a snapshot of the current state.
    pub fn certified_key(&self, key: &DomainKey) -> Option<Arc<CertifiedKey>> {
        let state = self.get(key)?;
        match state.tls_artifact().and_then(|artifact| artifact.certified_key()) {
            Ok(certified) => Some(Arc::new(certified)),
            Err(e) => {
                warn!(domain = %key, error = %e, "Stored certificate cannot serve handshakes");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::{Leaf, SigningKey};
    use chrono::{Duration, Utc};
    use tenure_common::KeyType;

    fn state_for(domain: &str) -> CertificateState {
        let key = SigningKey::generate(KeyType::Ecdsa).unwrap();
        let now = Utc::now();
        let cert = key
            .self_signed(&[domain.to_string()], now - Duration::hours(1), now + Duration::days(90))
            .unwrap();
        let leaf = Leaf::parse(&cert).unwrap();
        CertificateState::new(key, vec![cert], leaf)
    }

    #[test]
    fn test_insert_replaces_and_returns_previous() {
        let store = StateStore::new();
        let key = DomainKey::new("example.com");

        assert!(store.insert(key.clone(), state_for("example.com")).is_none());
        let second = state_for("example.com");
        let previous = store.insert(key.clone(), second.clone());

        assert!(previous.is_some());
        assert_eq!(*store.get(&key).unwrap(), second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = StateStore::new();
        let key = DomainKey::new("example.com");
        store.insert(key.clone(), state_for("example.com"));

        assert!(store.remove(&key).is_some());
        assert!(store.remove(&key).is_none());
        assert!(store.is_empty());
        assert!(!store.contains(&key));
    }

    #[test]
    fn test_certified_key_for_serving() {
        let store = StateStore::new();
        let key = DomainKey::new("example.com");
        assert!(store.certified_key(&key).is_none());

        store.insert(key.clone(), state_for("example.com"));
        let certified = store.certified_key(&key).unwrap();
        assert_eq!(certified.cert.len(), 1);
    }
}
