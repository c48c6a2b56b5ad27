//! In-process certificate cache.

use async_trait::async_trait;
use dashmap::DashMap;
use tenure_common::DomainKey;
use tracing::trace;

use crate::cache::CertCache;
use crate::error::CacheError;

/// Cache held in memory
///
/// Shared through an `Arc`, it stands in for storage shared by several
/// instances of the same process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<DomainKey, Vec<u8>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the stored bytes, without going through the async API
    pub fn snapshot(&self, key: &DomainKey) -> Option<Vec<u8>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CertCache for MemoryCache {
    async fn get(&self, key: &DomainKey) -> Result<Vec<u8>, CacheError> {
        self.snapshot(key).ok_or(CacheError::Miss)
    }

    async fn put(&self, key: &DomainKey, data: &[u8]) -> Result<(), CacheError> {
        trace!(domain = %key, bytes = data.len(), "Caching certificate bundle in memory");
        self.entries.insert(key.clone(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &DomainKey) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
