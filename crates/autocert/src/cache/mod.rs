//! Certificate cache backends.
//!
//! A cache may be shared by many process instances; it is the only channel
//! through which they learn about each other's renewals.

mod dir;
mod memory;

pub use dir::DirCache;
pub use memory::MemoryCache;

use crate::error::CacheError;
use async_trait::async_trait;
use tenure_common::DomainKey;

/// Byte store for encoded certificate bundles, keyed by slot.
#[async_trait]
pub trait CertCache: Send + Sync {
    /// Fetch the bundle for a slot. Returns [`CacheError::Miss`] if absent.
    async fn get(&self, key: &DomainKey) -> Result<Vec<u8>, CacheError>;

    /// Store the bundle for a slot, replacing any previous one.
    async fn put(&self, key: &DomainKey, data: &[u8]) -> Result<(), CacheError>;

    /// Remove the bundle for a slot. Removing a missing entry succeeds.
    async fn delete(&self, key: &DomainKey) -> Result<(), CacheError>;
}
